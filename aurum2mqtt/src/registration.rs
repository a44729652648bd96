use log::info;

/// Whether discovery metadata has been published during this process lifetime.
///
/// Starts unregistered and becomes registered exactly once, after a complete
/// discovery batch went out. There is no way back; a restart re-registers.
#[derive(Debug, Default)]
pub struct Registration {
    registered: bool,
}

impl Registration {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_registered(&self) -> bool {
        self.registered
    }

    /// Runs `register` if and only if nothing has been registered yet and
    /// flips to registered when it succeeds. Returns whether this call did the
    /// registration. Exclusive access through `&mut self` keeps two callers
    /// from both observing the unregistered state.
    pub fn register_with<E, F>(&mut self, register: F) -> Result<bool, E>
    where
        F: FnOnce() -> Result<(), E>,
    {
        if self.registered {
            return Ok(false);
        }
        register()?;
        self.registered = true;
        info!("discovery metadata registered");
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registers_once() {
        let mut registration = Registration::new();
        let mut calls = 0;
        assert_eq!(
            registration.register_with(|| -> Result<(), ()> {
                calls += 1;
                Ok(())
            }),
            Ok(true)
        );
        assert_eq!(
            registration.register_with(|| -> Result<(), ()> {
                calls += 1;
                Ok(())
            }),
            Ok(false)
        );
        assert_eq!(calls, 1);
        assert!(registration.is_registered());
    }

    #[test]
    fn failure_keeps_it_unregistered() {
        let mut registration = Registration::new();
        assert_eq!(registration.register_with(|| Err("broker gone")), Err("broker gone"));
        assert!(!registration.is_registered());
        assert_eq!(registration.register_with(|| Ok::<(), &str>(())), Ok(true));
    }
}
