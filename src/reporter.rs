use std::ops::ControlFlow;

use crate::message::ValidationMessage;

/// Sink for validation failures.
///
/// Validators sample [`ErrorReporter::error_count`] before and after a callee to
/// learn whether it failed, and stop checking siblings once an error has been
/// reported to a reporter whose [`ErrorReporter::fail_early`] is true.
pub trait ErrorReporter {
    fn error(&mut self, message: ValidationMessage);

    fn error_count(&self) -> usize;

    fn fail_early(&self) -> bool {
        false
    }
}

/// Keeps every message. Also used by combinators to probe branches locally.
#[derive(Debug, Default)]
pub struct CollectingReporter {
    errors: Vec<ValidationMessage>,
}

impl CollectingReporter {
    pub fn errors(&self) -> &[ValidationMessage] {
        &self.errors
    }

    pub fn into_errors(self) -> Vec<ValidationMessage> {
        self.errors
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }
}

impl ErrorReporter for CollectingReporter {
    fn error(&mut self, message: ValidationMessage) {
        self.errors.push(message);
    }

    fn error_count(&self) -> usize {
        self.errors.len()
    }
}

/// Stops at the first error.
#[derive(Debug, Default)]
pub struct FailFastReporter {
    first: Option<ValidationMessage>,
    count: usize,
}

impl FailFastReporter {
    pub fn first_error(&self) -> Option<&ValidationMessage> {
        self.first.as_ref()
    }
}

impl ErrorReporter for FailFastReporter {
    fn error(&mut self, message: ValidationMessage) {
        self.count += 1;
        if self.first.is_none() {
            self.first = Some(message);
        }
    }

    fn error_count(&self) -> usize {
        self.count
    }

    fn fail_early(&self) -> bool {
        true
    }
}

/// Forwards each message to a callback, which may ask to stop with `ControlFlow::Break`.
pub struct CallbackReporter<F> {
    callback: F,
    count: usize,
    stopped: bool,
}

impl<F> CallbackReporter<F>
where
    F: FnMut(&ValidationMessage) -> ControlFlow<()>,
{
    pub fn new(callback: F) -> Self {
        Self {
            callback,
            count: 0,
            stopped: false,
        }
    }
}

impl<F> ErrorReporter for CallbackReporter<F>
where
    F: FnMut(&ValidationMessage) -> ControlFlow<()>,
{
    fn error(&mut self, message: ValidationMessage) {
        self.count += 1;
        if self.stopped {
            return;
        }
        if (self.callback)(&message).is_break() {
            self.stopped = true;
        }
    }

    fn error_count(&self) -> usize {
        self.count
    }

    fn fail_early(&self) -> bool {
        self.stopped
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use crate::json_pointer::JsonPointer;
    use crate::uri::SchemaUri;

    fn message(text: &str) -> Result<ValidationMessage, Box<dyn std::error::Error>> {
        Ok(ValidationMessage::new(
            "type",
            JsonPointer::root(),
            SchemaUri::parse("https://example.com/s.json")?,
            JsonPointer::root(),
            text,
        ))
    }

    #[test]
    fn fail_fast_keeps_first() -> Result<(), Box<dyn std::error::Error>> {
        let mut reporter = FailFastReporter::default();
        reporter.error(message("first")?);
        reporter.error(message("second")?);

        assert!(reporter.fail_early());
        assert_eq!(reporter.error_count(), 2);
        assert_eq!(
            reporter.first_error().map(ValidationMessage::message),
            Some("first")
        );
        Ok(())
    }

    #[test]
    fn callback_break_turns_on_fail_early() -> Result<(), Box<dyn std::error::Error>> {
        let mut seen = Vec::new();
        {
            let mut reporter = CallbackReporter::new(|m: &ValidationMessage| {
                seen.push(m.message().to_owned());
                ControlFlow::Break(())
            });
            assert!(!reporter.fail_early());
            reporter.error(message("one")?);
            reporter.error(message("two")?);
            assert!(reporter.fail_early());
            assert_eq!(reporter.error_count(), 2);
        }
        assert_eq!(seen, vec!["one".to_owned()]);
        Ok(())
    }
}
