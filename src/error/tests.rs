//! Tests for error types.

#[cfg(test)]
mod tests {
    use super::super::*;

    #[test]
    fn test_error_display() {
        let err = Error::config("no watch roots declared");
        assert_eq!(
            err.to_string(),
            "configuration error: no watch roots declared"
        );
    }

    #[test]
    fn test_path_not_found_display() {
        let err = WatcherError::PathNotFound {
            path: PathBuf::from("/data"),
            waited_secs: 60,
        };
        assert_eq!(
            err.to_string(),
            "path '/data' was not found after waiting 60s"
        );
    }

    #[test]
    fn test_watcher_error_conversion() {
        let watch_err = WatcherError::watch_failed("/tmp/test", "permission denied");
        let err: Error = watch_err.into();
        assert!(matches!(err, Error::Watcher(_)));
        assert_eq!(
            err.to_string(),
            "watcher error: failed to watch path '/tmp/test': permission denied"
        );
    }

    #[test]
    fn test_recovery_exhausted_display() {
        let err = WatcherError::RecoveryExhausted {
            path: "/data".to_string(),
            attempts: 120,
        };
        assert_eq!(
            err.to_string(),
            "could not re-enable watch on '/data' after 120 attempts"
        );
    }

    #[test]
    fn test_action_error_conversion() {
        let action_err = ActionError::Copy {
            from: PathBuf::from("/data/a.txt"),
            to: PathBuf::from("/backup/a.txt"),
            reason: "disk full".to_string(),
        };
        let err: Error = action_err.into();
        assert!(matches!(err, Error::Action(_)));
        assert!(err.to_string().contains("disk full"));
    }

    #[test]
    fn test_action_error_verify() {
        let err = ActionError::Verify {
            from: PathBuf::from("/a"),
            to: PathBuf::from("/b"),
        };
        assert_eq!(
            err.to_string(),
            "verification failed: '/a' does not match '/b'"
        );
    }

    #[test]
    fn test_notification_error_conversion() {
        let err: Error = NotificationError::InvalidMethod("FETCH".to_string()).into();
        assert!(matches!(err, Error::Notification(_)));
        assert_eq!(
            err.to_string(),
            "notification error: invalid request method 'FETCH'"
        );
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_error_internal() {
        let err = Error::internal("worker thread panicked");
        assert_eq!(err.to_string(), "internal error: worker thread panicked");
    }

    #[test]
    fn test_error_propagation_with_question_mark() {
        fn inner() -> Result<i32> {
            Err(Error::config("inner error"))
        }

        fn outer() -> Result<i32> {
            let _ = inner()?;
            Ok(0)
        }

        let result = outer();
        assert!(result.is_err());
        assert_eq!(
            result.unwrap_err().to_string(),
            "configuration error: inner error"
        );
    }
}
