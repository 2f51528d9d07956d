use std::io;

use anyhow::Context as _;

use crate::terminal::TerminalModes;

/// Owns the terminal's interactive mode for the lifetime of a session.
///
/// Interactive mode is left again when the manager is dropped, even on panic.
pub struct TermManager {
    modes: Box<dyn TerminalModes>,
    interactive: bool,
}

impl TermManager {
    pub fn new(modes: impl TerminalModes + 'static) -> Self {
        Self {
            modes: Box::new(modes),
            interactive: false,
        }
    }

    pub fn is_interactive(&self) -> bool {
        self.interactive
    }

    pub fn start(&mut self) -> io::Result<()> {
        if !self.interactive {
            self.modes.enter_interactive()?;
            self.interactive = true;
        }
        Ok(())
    }

    pub fn stop(&mut self) -> io::Result<()> {
        if self.interactive {
            self.interactive = false;
            self.modes.leave_interactive()?;
        }
        Ok(())
    }

    /// Run `f` with the terminal back in its normal mode.
    ///
    /// Interactive mode is restored afterwards whether `f` succeeds, fails or
    /// panics. An error from `f` takes precedence over a failure to restore.
    pub fn suspend<T>(&mut self, f: impl FnOnce() -> anyhow::Result<T>) -> anyhow::Result<T> {
        if !self.interactive {
            return f();
        }
        self.modes
            .leave_interactive()
            .context("failed to leave interactive mode")?;
        let mut resume = Resume {
            modes: self.modes.as_mut(),
            pending: true,
        };
        let result = f();
        let restored = resume.restore();
        let value = result?;
        restored.context("failed to restore interactive mode")?;
        Ok(value)
    }

    /// Stop the whole process with SIGTSTP, as a shell's job control would,
    /// and pick up again once it is continued.
    pub fn suspend_process(&mut self) -> anyhow::Result<()> {
        self.suspend(|| {
            tracing::debug!("suspending process");
            // SAFETY: raise() only delivers a signal to the calling process.
            let rc = unsafe { libc::raise(libc::SIGTSTP) };
            if rc != 0 {
                return Err(io::Error::last_os_error()).context("failed to raise SIGTSTP");
            }
            Ok(())
        })
    }
}

impl Drop for TermManager {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            tracing::warn!(error = %e, "failed to restore terminal");
        }
    }
}

struct Resume<'a> {
    modes: &'a mut dyn TerminalModes,
    pending: bool,
}

impl Resume<'_> {
    fn restore(&mut self) -> io::Result<()> {
        self.pending = false;
        self.modes.enter_interactive()
    }
}

impl Drop for Resume<'_> {
    fn drop(&mut self) {
        if self.pending {
            if let Err(e) = self.restore() {
                tracing::warn!(error = %e, "failed to restore interactive mode");
            }
        }
    }
}


#[cfg(test)]
mod tests {
    use super::testing::RecordingModes;
    use super::*;

    #[test]
    fn start_and_stop_are_idempotent() {
        let modes = RecordingModes::default();
        let mut term = TermManager::new(modes.clone());
        term.start().unwrap();
        term.start().unwrap();
        term.stop().unwrap();
        term.stop().unwrap();
        assert_eq!(modes.calls(), vec!["enter", "leave"]);
    }

    #[test]
    fn suspend_restores_interactive_mode() {
        let modes = RecordingModes::default();
        let mut term = TermManager::new(modes.clone());
        term.start().unwrap();
        let value = term
            .suspend(|| {
                modes.log.lock().push("suspended");
                Ok(7)
            })
            .unwrap();
        assert_eq!(value, 7);
        assert_eq!(modes.calls(), vec!["enter", "leave", "suspended", "enter"]);
        assert!(term.is_interactive());
    }

    #[test]
    fn suspend_restores_interactive_mode_when_closure_fails() {
        let modes = RecordingModes::default();
        let mut term = TermManager::new(modes.clone());
        term.start().unwrap();
        let err = term
            .suspend(|| -> anyhow::Result<()> { anyhow::bail!("editor crashed") })
            .unwrap_err();
        assert_eq!(err.to_string(), "editor crashed");
        assert_eq!(modes.calls(), vec!["enter", "leave", "enter"]);
    }

    #[test]
    fn suspend_restores_interactive_mode_on_panic() {
        let modes = RecordingModes::default();
        let mut term = TermManager::new(modes.clone());
        term.start().unwrap();
        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _ = term.suspend(|| -> anyhow::Result<()> { panic!("boom") });
        }));
        assert!(outcome.is_err());
        assert_eq!(modes.calls(), vec!["enter", "leave", "enter"]);
    }

    #[test]
    fn suspend_outside_interactive_mode_just_runs() {
        let modes = RecordingModes::default();
        let mut term = TermManager::new(modes.clone());
        term.suspend(|| Ok(())).unwrap();
        assert!(modes.calls().is_empty());
    }

    #[test]
    fn drop_leaves_interactive_mode() {
        let modes = RecordingModes::default();
        {
            let mut term = TermManager::new(modes.clone());
            term.start().unwrap();
        }
        assert_eq!(modes.calls(), vec!["enter", "leave"]);
    }
}
