/// Sample match and filter chains.
///
/// Include/exclude decisions for process samples are driven by
/// configuration-supplied expression lists keyed by dimension
/// (`process.name`, `process.executable`). Expressions are literals
/// (optionally double-quoted) compared for exact equality, or
/// `regex <pattern>` entries compiled once and cached process-wide.
/// A chain is the logical OR across all of its matchers.
///
/// Non-process samples are always included by the include-chain and never
/// excluded by the exclude-chain.
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use dashmap::DashMap;
use regex::Regex;
use tracing::{debug, error};

use crate::sampler::Sample;

/// Dimension selecting the process display name.
pub const DIMENSION_PROCESS_NAME: &str = "process.name";

/// Dimension selecting the process command line.
pub const DIMENSION_PROCESS_EXECUTABLE: &str = "process.executable";

/// Process-wide cache of compiled expression patterns.
fn regex_cache() -> &'static DashMap<String, Arc<Regex>> {
    static CACHE: OnceLock<DashMap<String, Arc<Regex>>> = OnceLock::new();
    CACHE.get_or_init(DashMap::new)
}

/// Compile a pattern through the cache. Invalid patterns yield None.
fn cached_regex(pattern: &str) -> Option<Arc<Regex>> {
    if let Some(compiled) = regex_cache().get(pattern) {
        return Some(compiled.value().clone());
    }
    match Regex::new(pattern) {
        Ok(compiled) => {
            let compiled = Arc::new(compiled);
            regex_cache().insert(pattern.to_string(), compiled.clone());
            Some(compiled)
        }
        Err(e) => {
            error!(pattern, error = %e, "Invalid matcher pattern, matcher will never match");
            None
        }
    }
}

/// The field a matcher dissects out of a sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Dimension {
    ProcessName,
    ProcessExecutable,
    /// Unrecognised dimension name; never matches
    Unknown,
}

impl Dimension {
    fn from_name(name: &str) -> Self {
        match name {
            DIMENSION_PROCESS_NAME => Self::ProcessName,
            DIMENSION_PROCESS_EXECUTABLE => Self::ProcessExecutable,
            _ => Self::Unknown,
        }
    }

    /// Resolve the dimension against a sample, for both the structured and
    /// the flat-map shape.
    fn extract<'a>(&self, sample: &'a Sample) -> Option<&'a str> {
        match (self, sample) {
            (Self::ProcessName, Sample::Process(p)) => Some(&p.process_display_name),
            (Self::ProcessName, Sample::Flat(map)) => {
                map.get("processDisplayName").and_then(|v| v.as_str())
            }
            (Self::ProcessExecutable, Sample::Process(p)) => Some(&p.cmd_line),
            (Self::ProcessExecutable, Sample::Flat(map)) => {
                map.get("commandLine").and_then(|v| v.as_str())
            }
            _ => None,
        }
    }
}

/// One compiled expression.
#[derive(Debug, Clone)]
enum Expression {
    /// Exact string equality
    Literal(String),
    /// Cached regular expression
    Pattern(Arc<Regex>),
    /// Constant false (unknown dimension or invalid pattern)
    Never,
}

/// Strip one pair of surrounding double quotes, if present.
fn strip_quotes(s: &str) -> &str {
    s.strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(s)
}

/// Parse one configuration expression.
fn parse_expression(raw: &str) -> Expression {
    let trimmed = raw.trim();
    if let Some(pattern) = trimmed.strip_prefix("regex ") {
        match cached_regex(strip_quotes(pattern.trim())) {
            Some(compiled) => Expression::Pattern(compiled),
            None => Expression::Never,
        }
    } else {
        Expression::Literal(strip_quotes(trimmed).to_string())
    }
}

/// A single dimension/expression matcher.
#[derive(Debug, Clone)]
struct Matcher {
    dimension: Dimension,
    expression: Expression,
}

impl Matcher {
    fn matches(&self, sample: &Sample) -> bool {
        let Some(value) = self.dimension.extract(sample) else {
            return false;
        };
        match &self.expression {
            Expression::Literal(expected) => value == expected,
            Expression::Pattern(pattern) => pattern.is_match(value),
            Expression::Never => false,
        }
    }
}

/// A chain of matchers combined by logical OR.
#[derive(Debug, Clone, Default)]
pub struct MatcherChain {
    matchers: Vec<Matcher>,
}

impl MatcherChain {
    /// Build a chain from `dimension name → expression list`
    /// configuration. Unknown dimensions contribute constant-false
    /// matchers.
    pub fn from_config(config: &HashMap<String, Vec<String>>) -> Self {
        let mut matchers = Vec::new();
        for (dimension_name, expressions) in config {
            let dimension = Dimension::from_name(dimension_name);
            if dimension == Dimension::Unknown {
                debug!(dimension = %dimension_name, "Unknown matcher dimension");
            }
            for raw in expressions {
                let expression = if dimension == Dimension::Unknown {
                    Expression::Never
                } else {
                    parse_expression(raw)
                };
                matchers.push(Matcher {
                    dimension,
                    expression,
                });
            }
        }
        Self { matchers }
    }

    /// An empty chain is disabled; decisions fall through to the caller.
    pub fn enabled(&self) -> bool {
        !self.matchers.is_empty()
    }

    /// OR over all matchers, short-circuiting on the first hit.
    pub fn matches(&self, sample: &Sample) -> bool {
        self.matchers.iter().any(|m| m.matches(sample))
    }
}

/// The combined include/exclude decision for process samples.
#[derive(Debug, Clone, Default)]
pub struct ProcessFilter {
    include: MatcherChain,
    exclude: MatcherChain,
    /// Tri-state process metrics gate from configuration
    enable_process_metrics: Option<bool>,
    /// Fallback feature flag consulted when the gate is unset and no
    /// include-chain is configured
    full_process_sampling: bool,
}

impl ProcessFilter {
    /// Assemble the filter from its parts.
    pub fn new(
        include: MatcherChain,
        exclude: MatcherChain,
        enable_process_metrics: Option<bool>,
        full_process_sampling: bool,
    ) -> Self {
        Self {
            include,
            exclude,
            enable_process_metrics,
            full_process_sampling,
        }
    }

    /// The include decision, before the exclude-chain is consulted.
    fn should_include(&self, sample: &Sample) -> bool {
        if !sample.is_process() {
            return true;
        }
        match self.enable_process_metrics {
            Some(false) => false,
            Some(true) => !self.include.enabled() || self.include.matches(sample),
            None => {
                if self.include.enabled() {
                    self.include.matches(sample)
                } else {
                    self.full_process_sampling
                }
            }
        }
    }

    /// The exclude decision; only consulted for otherwise-included
    /// process samples.
    fn should_exclude(&self, sample: &Sample) -> bool {
        sample.is_process() && self.exclude.enabled() && self.exclude.matches(sample)
    }

    /// Whether the sample survives both chains.
    pub fn accepts(&self, sample: &Sample) -> bool {
        self.should_include(sample) && !self.should_exclude(sample)
    }
}
