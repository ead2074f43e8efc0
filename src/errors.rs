use std::fmt;

/// Accumulates every configuration problem found during startup.
///
/// Validation never stops at the first error; the process either starts
/// with a fully valid configuration or refuses to start with the complete
/// list of problems.
#[derive(Debug, Default)]
pub struct ConfigReport {
    problems: Vec<String>,
}

impl ConfigReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, problem: impl Into<String>) {
        self.problems.push(problem.into());
    }

    pub fn is_empty(&self) -> bool {
        self.problems.is_empty()
    }

    pub fn len(&self) -> usize {
        self.problems.len()
    }

    pub fn problems(&self) -> &[String] {
        &self.problems
    }
}

impl fmt::Display for ConfigReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "the configuration is invalid:")?;
        for problem in &self.problems {
            write!(f, "\n  {problem}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ConfigReport {}
