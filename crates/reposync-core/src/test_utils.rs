//! Helpers for unit tests that touch process environment variables

use once_cell::sync::Lazy;
use std::env;

/// Held by every test that reads or writes `REPOSYNC_*` variables
pub static ENV_MUTEX: Lazy<tokio::sync::Mutex<()>> = Lazy::new(|| tokio::sync::Mutex::new(()));

/// Restores every variable it changed when dropped
#[derive(Default)]
pub struct EnvVarGuard {
    saved: Vec<(String, Option<String>)>,
}

impl EnvVarGuard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: &str, value: &str) {
        self.saved.push((key.to_string(), env::var(key).ok()));
        // SAFETY: callers hold ENV_MUTEX
        unsafe { env::set_var(key, value) };
    }

    pub fn remove(&mut self, key: &str) {
        self.saved.push((key.to_string(), env::var(key).ok()));
        // SAFETY: callers hold ENV_MUTEX
        unsafe { env::remove_var(key) };
    }
}

impl Drop for EnvVarGuard {
    fn drop(&mut self) {
        while let Some((key, original)) = self.saved.pop() {
            // SAFETY: the owning test still holds ENV_MUTEX
            unsafe {
                match original {
                    Some(value) => env::set_var(&key, value),
                    None => env::remove_var(&key),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_guard_restores_original_values() {
        let _lock = ENV_MUTEX.lock().await;
        let key = "REPOSYNC_TEST_UTILS_SCRATCH";
        {
            let mut outer = EnvVarGuard::new();
            outer.set(key, "original");
            {
                let mut inner = EnvVarGuard::new();
                inner.remove(key);
                inner.set(key, "changed");
                assert_eq!(env::var(key).as_deref(), Ok("changed"));
            }
            assert_eq!(env::var(key).as_deref(), Ok("original"));
        }
        assert!(env::var(key).is_err());
    }
}
