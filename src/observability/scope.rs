//! Begin/complete logging around one unit of work
//!
//! - `{name}_BEGIN` on creation
//! - `{name}_COMPLETE` from `complete`, with elapsed time
//! - `{name}_FAILED` from `fail`
//! - `{name}_INCOMPLETE` if dropped without either

use std::time::Instant;

use super::logger::{Logger, Severity};

/// Logs the lifecycle of one operation
pub struct ObservationScope<'a> {
    name: &'a str,
    fields: Vec<(&'a str, String)>,
    started: Instant,
    finished: bool,
}

impl<'a> ObservationScope<'a> {
    pub fn new(name: &'a str) -> Self {
        Self::with_fields(name, &[])
    }

    /// Fields given here are repeated on every line of the scope
    pub fn with_fields(name: &'a str, fields: &[(&'a str, String)]) -> Self {
        let scope = Self {
            name,
            fields: fields.to_vec(),
            started: Instant::now(),
            finished: false,
        };
        scope.emit(Severity::Info, "BEGIN", &[]);
        scope
    }

    pub fn complete(self) {
        self.complete_with_fields(&[]);
    }

    pub fn complete_with_fields(mut self, extra: &[(&str, &str)]) {
        self.finished = true;
        let elapsed = self.elapsed_ms();
        let mut fields: Vec<(&str, &str)> = extra.to_vec();
        fields.push(("elapsed_ms", &elapsed));
        self.emit(Severity::Info, "COMPLETE", &fields);
    }

    pub fn fail(mut self, code: &str, reason: &str) {
        self.finished = true;
        self.emit(Severity::Error, "FAILED", &[("code", code), ("reason", reason)]);
    }

    /// Milliseconds since the scope opened
    pub fn elapsed_ms(&self) -> String {
        self.started.elapsed().as_millis().to_string()
    }

    fn emit(&self, severity: Severity, suffix: &str, extra: &[(&str, &str)]) {
        Logger::write_line(&self.render(severity, suffix, extra));
    }

    /// One line of this scope: scope fields first, then `extra`
    fn render(&self, severity: Severity, suffix: &str, extra: &[(&str, &str)]) -> String {
        let event = format!("{}_{}", self.name, suffix);
        let mut fields: Vec<(&str, &str)> = self
            .fields
            .iter()
            .map(|(k, v)| (*k, v.as_str()))
            .collect();
        fields.extend_from_slice(extra);
        Logger::render(severity, &event, &fields)
    }
}

impl Drop for ObservationScope<'_> {
    fn drop(&mut self) {
        if !self.finished {
            self.emit(Severity::Warn, "INCOMPLETE", &[]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(line: &str) -> serde_json::Value {
        serde_json::from_str(line).unwrap()
    }

    #[test]
    fn test_begin_line_carries_scope_fields() {
        let scope = ObservationScope::with_fields("TEST_RUN", &[("object", "1.2".to_string())]);
        let line = scope.render(Severity::Info, "BEGIN", &[]);
        assert_eq!(
            line,
            "{\"event\":\"TEST_RUN_BEGIN\",\"severity\":\"INFO\",\"object\":\"1.2\"}\n"
        );
        scope.complete();
    }

    #[test]
    fn test_extra_fields_merge_sorted() {
        let scope = ObservationScope::with_fields("TEST_RUN", &[("object", "1.2".to_string())]);
        let line = scope.render(
            Severity::Info,
            "COMPLETE",
            &[("status", "complete"), ("elapsed_ms", "4")],
        );
        let elapsed = line.find("\"elapsed_ms\"").unwrap();
        let object = line.find("\"object\"").unwrap();
        let status = line.find("\"status\"").unwrap();
        assert!(elapsed < object && object < status);
        assert_eq!(parse(&line)["event"], "TEST_RUN_COMPLETE");
        scope.complete();
    }

    #[test]
    fn test_failed_line_escapes_reason() {
        let scope = ObservationScope::new("TEST_RUN");
        let line = scope.render(
            Severity::Error,
            "FAILED",
            &[("code", "PIPE_EXEC_SOURCE"), ("reason", "disk \"went\" away\n")],
        );
        let parsed = parse(&line);
        assert_eq!(parsed["severity"], "ERROR");
        assert_eq!(parsed["code"], "PIPE_EXEC_SOURCE");
        assert_eq!(parsed["reason"], "disk \"went\" away\n");
        assert_eq!(line.matches('\n').count(), 1);
        scope.fail("PIPE_EXEC_SOURCE", "disk went away");
    }

    #[test]
    fn test_elapsed_is_number() {
        let scope = ObservationScope::new("TEST_RUN");
        let ms: u128 = scope.elapsed_ms().parse().unwrap();
        assert!(ms < 60_000);
        scope.complete();
    }
}
