//! Version probes for the external toolchain (Node.js, PHP, Composer, Flutter).

use std::time::Duration;

use regex::Regex;
use semver::{Version, VersionReq};
use tracing::debug;

use deploy_platform::process::{CommandError, CommandOutput, Invocation, QUERY_TIMEOUT};

const FLUTTER_TIMEOUT: Duration = Duration::from_secs(10);

/// A tool the deployment needs, and how to recognise a good enough install.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToolRequirement {
    /// Name shown in the check report
    pub name: &'static str,
    pub program: &'static str,
    pub version_args: &'static [&'static str],
    /// Regex whose first capture group is a `major.minor.patch` version
    pub version_pattern: &'static str,
    /// Lowest acceptable version, as a semver requirement operand (`18`, `8.2`)
    pub minimum: Option<&'static str>,
    pub timeout: Duration,
    /// Whether a successful run with unrecognisable output still counts
    pub unparsed_passes: bool,
    pub missing_message: &'static str,
    pub recommendation: &'static str,
}

pub const NODE: ToolRequirement = ToolRequirement {
    name: "Node.js",
    program: "node",
    version_args: &["--version"],
    version_pattern: r"v(\d+\.\d+\.\d+)",
    minimum: Some("18"),
    timeout: QUERY_TIMEOUT,
    unparsed_passes: false,
    missing_message: "Not installed or not in PATH",
    recommendation: "Install Node.js 18+ from https://nodejs.org/",
};

pub const PHP: ToolRequirement = ToolRequirement {
    name: "PHP",
    program: "php",
    version_args: &["--version"],
    version_pattern: r"PHP (\d+\.\d+\.\d+)",
    minimum: Some("8.2"),
    timeout: QUERY_TIMEOUT,
    unparsed_passes: false,
    missing_message: "Not installed or not in PATH",
    recommendation: "Install PHP 8.2+ from https://windows.php.net/download/",
};

pub const COMPOSER: ToolRequirement = ToolRequirement {
    name: "Composer",
    program: "composer",
    version_args: &["--version"],
    version_pattern: r"Composer (?:version )?(\d+\.\d+\.\d+)",
    minimum: Some("2"),
    timeout: QUERY_TIMEOUT,
    unparsed_passes: true,
    missing_message: "Not installed or not in PATH",
    recommendation: "Install Composer 2+ from https://getcomposer.org/",
};

pub const FLUTTER: ToolRequirement = ToolRequirement {
    name: "Flutter SDK",
    program: "flutter",
    version_args: &["--version"],
    version_pattern: r"Flutter (\d+\.\d+\.\d+)",
    minimum: None,
    timeout: FLUTTER_TIMEOUT,
    unparsed_passes: true,
    missing_message: "Not installed (relay device build will be skipped)",
    recommendation: "Install Flutter SDK if building relay device",
};

/// What a version probe found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolVerdict {
    Satisfied(Version),
    TooOld(Version),
    /// Ran successfully but printed no recognisable version
    Unparsed,
    Missing,
}

impl ToolRequirement {
    /// The version query. On Windows it goes through `cmd /C` so that `.cmd` and
    /// `.bat` shims (composer, flutter) resolve the way they do in a shell.
    pub fn invocation(&self) -> Invocation {
        let invocation = if cfg!(windows) {
            Invocation::new("cmd").args(["/C", self.program])
        } else {
            Invocation::new(self.program)
        };
        invocation
            .args(self.version_args.iter().copied())
            .timeout(self.timeout)
    }

    pub fn evaluate(&self, result: Result<CommandOutput, CommandError>) -> ToolVerdict {
        let output = match result {
            Ok(output) if output.success() => output,
            Ok(output) => {
                debug!("{} exited with {:?}", self.program, output.exit_code);
                return ToolVerdict::Missing;
            }
            Err(e) => {
                debug!("{} probe failed: {}", self.program, e);
                return ToolVerdict::Missing;
            }
        };

        let Some(version) = parse_version(&output.stdout, self.version_pattern) else {
            return ToolVerdict::Unparsed;
        };

        match self.requirement() {
            Some(req) if !req.matches(&version) => ToolVerdict::TooOld(version),
            _ => ToolVerdict::Satisfied(version),
        }
    }

    fn requirement(&self) -> Option<VersionReq> {
        self.minimum
            .and_then(|minimum| VersionReq::parse(&format!(">={minimum}")).ok())
    }
}

/// First `major.minor.patch` captured by `pattern` in `text`.
pub fn parse_version(text: &str, pattern: &str) -> Option<Version> {
    let re = Regex::new(pattern).ok()?;
    let captured = re.captures(text)?.get(1)?;
    Version::parse(captured.as_str()).ok()
}
