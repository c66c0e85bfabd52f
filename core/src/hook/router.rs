use std::sync::{Arc, Mutex, PoisonError};

use crate::preview::PreviewFrame;

/// A preview observer. Purely observational: no ownership of the generation,
/// invoked with `(step, total, frame-or-none)` after every denoising step.
pub trait PreviewSubscriber: Send + Sync {
    fn name(&self) -> &str;

    fn on_step(
        &self,
        step: usize,
        total: usize,
        frame: Option<&PreviewFrame>,
    ) -> anyhow::Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SubscriberTag {
    /// The active preview route; at most one after each registration.
    Preview,
    /// Other integrations; persist across preview re-registration.
    External,
}

struct Entry {
    tag: SubscriberTag,
    subscriber: Arc<dyn PreviewSubscriber>,
}

/// Ordered fan-out list for step notifications.
///
/// Passed explicitly into the generation call rather than living in process
/// globals; one router serves one generation at a time. Registrations racing
/// from concurrent generations keep last-wins semantics — concurrent
/// generation is not a supported mode.
#[derive(Default)]
pub struct PreviewRouter {
    entries: Mutex<Vec<Entry>>,
}

impl PreviewRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install `subscriber` as the preview route. Any previously registered
    /// preview-tagged subscriber is removed first, so repeated setup is
    /// idempotent and the last registration wins. External subscribers are
    /// left untouched.
    pub fn register_preview(&self, subscriber: Arc<dyn PreviewSubscriber>) {
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|e| e.tag != SubscriberTag::Preview);
        let removed = before - entries.len();
        if removed > 0 {
            tracing::debug!(removed, "replaced previous preview subscriber");
        }
        entries.push(Entry {
            tag: SubscriberTag::Preview,
            subscriber,
        });
    }

    /// Add a non-preview integration; survives preview re-registration.
    pub fn add_subscriber(&self, subscriber: Arc<dyn PreviewSubscriber>) {
        self.lock().push(Entry {
            tag: SubscriberTag::External,
            subscriber,
        });
    }

    /// Remove every subscriber with the given name. Idempotent.
    pub fn remove_subscriber(&self, name: &str) {
        self.lock().retain(|e| e.subscriber.name() != name);
    }

    /// Invoke every subscriber in registration order. A failing subscriber
    /// is logged and skipped; it never stops the rest of the list.
    pub fn notify(&self, step: usize, total: usize, frame: Option<&PreviewFrame>) {
        let subscribers: Vec<Arc<dyn PreviewSubscriber>> = self
            .lock()
            .iter()
            .map(|e| e.subscriber.clone())
            .collect();

        for subscriber in subscribers {
            if let Err(e) = subscriber.on_step(step, total, frame) {
                tracing::warn!(
                    error.kind = "preview.subscriber_failed",
                    subscriber = subscriber.name(),
                    step,
                    total,
                    error = %e,
                    "preview subscriber failed"
                );
            }
        }
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn preview_count(&self) -> usize {
        self.lock()
            .iter()
            .filter(|e| e.tag == SubscriberTag::Preview)
            .count()
    }

    pub fn subscriber_names(&self) -> Vec<String> {
        self.lock()
            .iter()
            .map(|e| e.subscriber.name().to_string())
            .collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Entry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Recorder {
        name: String,
        calls: AtomicUsize,
        frames_seen: AtomicUsize,
        fail: bool,
    }

    impl Recorder {
        fn new(name: &str, fail: bool) -> Arc<Self> {
            Arc::new(Self {
                name: name.to_string(),
                calls: AtomicUsize::new(0),
                frames_seen: AtomicUsize::new(0),
                fail,
            })
        }
    }

    impl PreviewSubscriber for Recorder {
        fn name(&self) -> &str {
            &self.name
        }

        fn on_step(
            &self,
            _step: usize,
            _total: usize,
            frame: Option<&PreviewFrame>,
        ) -> anyhow::Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if frame.is_some() {
                self.frames_seen.fetch_add(1, Ordering::SeqCst);
            }
            if self.fail {
                anyhow::bail!("subscriber down");
            }
            Ok(())
        }
    }

    #[test]
    fn second_preview_registration_replaces_the_first() {
        let router = PreviewRouter::new();
        let a = Recorder::new("a", false);
        let b = Recorder::new("b", false);

        router.register_preview(a.clone());
        router.register_preview(b.clone());

        assert_eq!(router.preview_count(), 1);
        assert_eq!(router.subscriber_names(), vec!["b".to_string()]);

        router.notify(1, 10, None);
        assert_eq!(a.calls.load(Ordering::SeqCst), 0);
        assert_eq!(b.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn external_subscribers_survive_preview_reregistration() {
        let router = PreviewRouter::new();
        let external = Recorder::new("external", false);
        router.add_subscriber(external.clone());
        router.register_preview(Recorder::new("p1", false));
        router.register_preview(Recorder::new("p2", false));

        assert_eq!(router.len(), 2);
        router.notify(1, 10, None);
        assert_eq!(external.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn failing_subscriber_does_not_stop_the_rest() {
        let router = PreviewRouter::new();
        let bad = Recorder::new("bad", true);
        let good = Recorder::new("good", false);
        router.add_subscriber(bad.clone());
        router.add_subscriber(good.clone());

        router.notify(2, 10, None);
        assert_eq!(bad.calls.load(Ordering::SeqCst), 1);
        assert_eq!(good.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn remove_subscriber_is_idempotent() {
        let router = PreviewRouter::new();
        router.add_subscriber(Recorder::new("x", false));
        router.remove_subscriber("x");
        router.remove_subscriber("x");
        assert!(router.is_empty());
    }

    #[test]
    fn notify_carries_frames_through() {
        let router = PreviewRouter::new();
        let sub = Recorder::new("s", false);
        router.register_preview(sub.clone());

        let frame = PreviewFrame::new(3, 10, "data:image/png;base64,QUJD".into());
        router.notify(3, 10, Some(&frame));
        router.notify(4, 10, None);

        assert_eq!(sub.calls.load(Ordering::SeqCst), 2);
        assert_eq!(sub.frames_seen.load(Ordering::SeqCst), 1);
    }
}
