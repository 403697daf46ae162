use crate::models::audio_models::AudioSessionId;
use crate::models::error::CaptureError;
use crate::traits::echo_canceler::{EchoCanceler, EchoCancelerService};

/// Holds at most one echo canceller for a capture session.
///
/// `attach` is idempotent: once an instance is held, later calls never ask
/// the platform for another one.
#[derive(Default)]
pub struct EchoCancelerSlot {
    effect: Option<Box<dyn EchoCanceler>>,
}

impl EchoCancelerSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_attached(&self) -> bool {
        self.effect.is_some()
    }

    /// Create and enable an instance for `session` unless one is held.
    ///
    /// Returns `true` if this call attached a new instance.
    pub fn attach(
        &mut self,
        service: &dyn EchoCancelerService,
        session: AudioSessionId,
    ) -> Result<bool, CaptureError> {
        if self.effect.is_some() {
            return Ok(false);
        }
        if !service.is_available() {
            log::info!("Echo canceller not available on this platform");
            return Ok(false);
        }

        let Some(mut effect) = service.create(session)? else {
            log::warn!("Platform declined to create an echo canceller for {}", session);
            return Ok(false);
        };

        if let Err(e) = effect.set_enabled(true) {
            if let Err(release_error) = effect.release() {
                log::warn!("Failed to release echo canceller: {}", release_error);
            }
            return Err(e);
        }

        log::info!("Echo canceller enabled for {}", session);
        self.effect = Some(effect);
        Ok(true)
    }

    pub fn release(&mut self) -> Result<(), CaptureError> {
        match self.effect.take() {
            Some(mut effect) => effect.release(),
            None => Ok(()),
        }
    }
}

impl Drop for EchoCancelerSlot {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            log::warn!("Failed to release echo canceller: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::*;

    struct Effect {
        enabled: bool,
        releases: Arc<AtomicUsize>,
    }

    impl EchoCanceler for Effect {
        fn set_enabled(&mut self, enabled: bool) -> Result<(), CaptureError> {
            self.enabled = enabled;
            Ok(())
        }

        fn enabled(&self) -> bool {
            self.enabled
        }

        fn release(&mut self) -> Result<(), CaptureError> {
            self.releases.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct Factory {
        available: bool,
        creations: AtomicUsize,
        releases: Arc<AtomicUsize>,
    }

    impl Factory {
        fn new(available: bool) -> Self {
            Self {
                available,
                creations: AtomicUsize::new(0),
                releases: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    impl EchoCancelerService for Factory {
        fn is_available(&self) -> bool {
            self.available
        }

        fn create(
            &self,
            _session: AudioSessionId,
        ) -> Result<Option<Box<dyn EchoCanceler>>, CaptureError> {
            self.creations.fetch_add(1, Ordering::SeqCst);
            Ok(Some(Box::new(Effect {
                enabled: false,
                releases: Arc::clone(&self.releases),
            })))
        }
    }

    #[test]
    fn attaches_exactly_once() {
        let factory = Factory::new(true);
        let mut slot = EchoCancelerSlot::new();

        assert!(slot.attach(&factory, AudioSessionId(7)).unwrap());
        assert!(!slot.attach(&factory, AudioSessionId(7)).unwrap());
        assert!(!slot.attach(&factory, AudioSessionId(7)).unwrap());

        assert_eq!(factory.creations.load(Ordering::SeqCst), 1);
        assert!(slot.is_attached());
    }

    #[test]
    fn unavailable_platform_creates_nothing() {
        let factory = Factory::new(false);
        let mut slot = EchoCancelerSlot::new();

        assert!(!slot.attach(&factory, AudioSessionId(1)).unwrap());
        assert_eq!(factory.creations.load(Ordering::SeqCst), 0);
        assert!(!slot.is_attached());
    }

    #[test]
    fn release_and_drop_release_once() {
        let factory = Factory::new(true);
        {
            let mut slot = EchoCancelerSlot::new();
            slot.attach(&factory, AudioSessionId(1)).unwrap();
            slot.release().unwrap();
        }
        assert_eq!(factory.releases.load(Ordering::SeqCst), 1);
    }
}
