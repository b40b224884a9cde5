//! Configuration resolution for the pipeline.
//!
//! Enablement for every stage can come from three overlapping sources: an
//! explicit per-stage option, the master "enable all" option, and an
//! environment-derived override. Two privileged stages additionally support
//! a disable override that wins over everything, including the master
//! enable — an escape hatch for stages known to conflict with specific
//! downstream consumers of the unit.
//!
//! Resolution happens exactly once, before scheduling begins, and produces
//! an immutable [`ResolvedConfig`] that is passed into the scheduler
//! explicitly. There is no global mutable toggle or seed state. Toggle
//! resolution is a pure function of its inputs: the environment is captured
//! into an [`EnvOverrides`] snapshot first, so identical snapshots always
//! yield identical [`ToggleConfiguration`] values.

use rand::{rngs::OsRng, RngCore};
use strum::EnumCount;

use crate::catalog::PassKind;

/// Sentinel seed value meaning "unspecified".
///
/// When the configured seed equals this value, the resolved seed is drawn
/// from a secure entropy source instead; any other value is used verbatim,
/// enabling reproducible runs.
pub const SEED_SENTINEL: u64 = 0x1337;

/// Explicit options for one run, one boolean per stage plus the master
/// enable, the privileged disable overrides and the seed.
///
/// Defaults to everything off with the seed unspecified. Builder-style
/// `with_*` methods support incremental construction.
#[derive(Debug, Clone)]
pub struct ObfuscationOptions {
    /// Enables every stage unless individually disabled.
    pub enable_all: bool,
    /// Enable anti-class-dump.
    pub enable_anti_class_dump: bool,
    /// Enable call-site obfuscation.
    pub enable_function_call_obfuscate: bool,
    /// Enable string encryption.
    pub enable_string_encryption: bool,
    /// Enable basic-block splitting.
    pub enable_basic_block_split: bool,
    /// Enable bogus control flow.
    pub enable_bogus_control_flow: bool,
    /// Enable control-flow flattening.
    pub enable_flattening: bool,
    /// Enable instruction substitution.
    pub enable_substitution: bool,
    /// Enable indirect branching.
    pub enable_indirect_branch: bool,
    /// Enable function wrapping.
    pub enable_function_wrapper: bool,
    /// Forces indirect branching off even under the master enable.
    pub disable_indirect_branch: bool,
    /// Forces anti-class-dump off even under the master enable.
    pub disable_anti_class_dump: bool,
    /// PRNG seed; [`SEED_SENTINEL`] means unspecified.
    pub seed: u64,
}

impl Default for ObfuscationOptions {
    fn default() -> Self {
        Self {
            enable_all: false,
            enable_anti_class_dump: false,
            enable_function_call_obfuscate: false,
            enable_string_encryption: false,
            enable_basic_block_split: false,
            enable_bogus_control_flow: false,
            enable_flattening: false,
            enable_substitution: false,
            enable_indirect_branch: false,
            enable_function_wrapper: false,
            disable_indirect_branch: false,
            disable_anti_class_dump: false,
            seed: SEED_SENTINEL,
        }
    }
}

impl ObfuscationOptions {
    /// Creates options with everything off and the seed unspecified.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the master "enable all" option.
    #[must_use]
    pub fn with_all(mut self, enable: bool) -> Self {
        self.enable_all = enable;
        self
    }

    /// Sets the explicit enable option for one stage.
    #[must_use]
    pub fn with_pass(mut self, kind: PassKind, enable: bool) -> Self {
        match kind {
            PassKind::AntiClassDump => self.enable_anti_class_dump = enable,
            PassKind::FunctionCallObfuscate => self.enable_function_call_obfuscate = enable,
            PassKind::StringEncryption => self.enable_string_encryption = enable,
            PassKind::BasicBlockSplit => self.enable_basic_block_split = enable,
            PassKind::BogusControlFlow => self.enable_bogus_control_flow = enable,
            PassKind::Flattening => self.enable_flattening = enable,
            PassKind::Substitution => self.enable_substitution = enable,
            PassKind::IndirectBranch => self.enable_indirect_branch = enable,
            PassKind::FunctionWrapper => self.enable_function_wrapper = enable,
        }
        self
    }

    /// Sets an explicit seed for reproducible runs.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// The explicit enable option for one stage.
    #[must_use]
    pub fn enabled(&self, kind: PassKind) -> bool {
        match kind {
            PassKind::AntiClassDump => self.enable_anti_class_dump,
            PassKind::FunctionCallObfuscate => self.enable_function_call_obfuscate,
            PassKind::StringEncryption => self.enable_string_encryption,
            PassKind::BasicBlockSplit => self.enable_basic_block_split,
            PassKind::BogusControlFlow => self.enable_bogus_control_flow,
            PassKind::Flattening => self.enable_flattening,
            PassKind::Substitution => self.enable_substitution,
            PassKind::IndirectBranch => self.enable_indirect_branch,
            PassKind::FunctionWrapper => self.enable_function_wrapper,
        }
    }
}

/// Snapshot of the environment-derived overrides.
///
/// Each flag is set when the matching environment variable is present,
/// regardless of its value. Capturing the environment into this struct once
/// keeps resolution a pure function of its inputs; tests construct the
/// struct directly.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvOverrides {
    /// `ALLOBF` — equivalent to the master enable.
    pub enable_all: bool,
    /// `ACDOBF`
    pub enable_anti_class_dump: bool,
    /// `FCO`
    pub enable_function_call_obfuscate: bool,
    /// `STRCRY`
    pub enable_string_encryption: bool,
    /// `SPLITOBF`
    pub enable_basic_block_split: bool,
    /// `BCFOBF`
    pub enable_bogus_control_flow: bool,
    /// `CFFOBF`
    pub enable_flattening: bool,
    /// `SUBOBF`
    pub enable_substitution: bool,
    /// `INDIBRAN`
    pub enable_indirect_branch: bool,
    /// `FUNCWRA`
    pub enable_function_wrapper: bool,
    /// `NOINDIBRAN`
    pub disable_indirect_branch: bool,
    /// `NOACDOBF`
    pub disable_anti_class_dump: bool,
}

impl EnvOverrides {
    /// Captures the override flags from the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        let set = |name: &str| std::env::var_os(name).is_some();
        Self {
            enable_all: set("ALLOBF"),
            enable_anti_class_dump: set("ACDOBF"),
            enable_function_call_obfuscate: set("FCO"),
            enable_string_encryption: set("STRCRY"),
            enable_basic_block_split: set("SPLITOBF"),
            enable_bogus_control_flow: set("BCFOBF"),
            enable_flattening: set("CFFOBF"),
            enable_substitution: set("SUBOBF"),
            enable_indirect_branch: set("INDIBRAN"),
            enable_function_wrapper: set("FUNCWRA"),
            disable_indirect_branch: set("NOINDIBRAN"),
            disable_anti_class_dump: set("NOACDOBF"),
        }
    }

    /// The environment-derived enable flag for one stage.
    #[must_use]
    pub fn enabled(&self, kind: PassKind) -> bool {
        match kind {
            PassKind::AntiClassDump => self.enable_anti_class_dump,
            PassKind::FunctionCallObfuscate => self.enable_function_call_obfuscate,
            PassKind::StringEncryption => self.enable_string_encryption,
            PassKind::BasicBlockSplit => self.enable_basic_block_split,
            PassKind::BogusControlFlow => self.enable_bogus_control_flow,
            PassKind::Flattening => self.enable_flattening,
            PassKind::Substitution => self.enable_substitution,
            PassKind::IndirectBranch => self.enable_indirect_branch,
            PassKind::FunctionWrapper => self.enable_function_wrapper,
        }
    }
}

/// Immutable per-stage enablement, resolved once before scheduling begins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToggleConfiguration {
    enabled: [bool; PassKind::COUNT],
}

impl ToggleConfiguration {
    /// Resolves enablement for every stage.
    ///
    /// Per stage P:
    /// `effective(P) = (explicit(P) || master || env(P)) && !disabled(P)`
    /// where the disable override exists only for indirect branching and
    /// anti-class-dump and takes precedence over every enable source.
    #[must_use]
    pub fn resolve(options: &ObfuscationOptions, env: &EnvOverrides) -> Self {
        let master = options.enable_all || env.enable_all;
        let mut enabled = [false; PassKind::COUNT];
        for desc in &crate::catalog::CATALOG {
            let kind = desc.kind;
            let on = options.enabled(kind) || master || env.enabled(kind);
            let off = match kind {
                PassKind::IndirectBranch => {
                    options.disable_indirect_branch || env.disable_indirect_branch
                }
                PassKind::AntiClassDump => {
                    options.disable_anti_class_dump || env.disable_anti_class_dump
                }
                _ => false,
            };
            enabled[kind.rank()] = on && !off;
        }
        Self { enabled }
    }

    /// The resolved decision for one stage.
    #[must_use]
    pub fn enabled(&self, kind: PassKind) -> bool {
        self.enabled[kind.rank()]
    }

    /// Returns `true` if no stage is enabled.
    #[must_use]
    pub fn all_disabled(&self) -> bool {
        self.enabled.iter().all(|on| !on)
    }
}

/// The immutable configuration a scheduler run consumes: resolved toggles
/// plus the resolved seed.
#[derive(Debug, Clone, Copy)]
pub struct ResolvedConfig {
    /// Per-stage enablement decisions.
    pub toggles: ToggleConfiguration,
    /// The seed that initializes the run's PRNG.
    pub seed: u64,
}

impl ResolvedConfig {
    /// Resolves toggles and the seed from options and an environment
    /// snapshot.
    ///
    /// Toggle resolution is pure. Seed resolution is pure when an explicit
    /// seed is set; with the seed left at [`SEED_SENTINEL`] a fresh value
    /// is drawn from the operating system's entropy source, so two such
    /// runs differ with overwhelming probability.
    #[must_use]
    pub fn resolve(options: &ObfuscationOptions, env: &EnvOverrides) -> Self {
        let seed = if options.seed != SEED_SENTINEL {
            options.seed
        } else {
            OsRng.next_u64()
        };
        Self {
            toggles: ToggleConfiguration::resolve(options, env),
            seed,
        }
    }
}

#[cfg(test)]
mod tests {
    use strum::IntoEnumIterator;

    use super::*;

    #[test]
    fn test_default_options_disable_everything() {
        let toggles =
            ToggleConfiguration::resolve(&ObfuscationOptions::default(), &EnvOverrides::default());
        assert!(toggles.all_disabled());
    }

    #[test]
    fn test_master_enables_every_stage() {
        let options = ObfuscationOptions::new().with_all(true);
        let toggles = ToggleConfiguration::resolve(&options, &EnvOverrides::default());
        for kind in PassKind::iter() {
            assert!(toggles.enabled(kind), "{} not enabled", kind.name());
        }
    }

    #[test]
    fn test_env_master_equivalent_to_explicit_master() {
        let env = EnvOverrides {
            enable_all: true,
            ..EnvOverrides::default()
        };
        let via_env = ToggleConfiguration::resolve(&ObfuscationOptions::default(), &env);
        let via_option = ToggleConfiguration::resolve(
            &ObfuscationOptions::new().with_all(true),
            &EnvOverrides::default(),
        );
        assert_eq!(via_env, via_option);
    }

    #[test]
    fn test_toggle_equivalence_per_stage() {
        for kind in PassKind::iter() {
            let via_option = ToggleConfiguration::resolve(
                &ObfuscationOptions::new().with_pass(kind, true),
                &EnvOverrides::default(),
            );
            let mut env = EnvOverrides::default();
            match kind {
                PassKind::AntiClassDump => env.enable_anti_class_dump = true,
                PassKind::FunctionCallObfuscate => env.enable_function_call_obfuscate = true,
                PassKind::StringEncryption => env.enable_string_encryption = true,
                PassKind::BasicBlockSplit => env.enable_basic_block_split = true,
                PassKind::BogusControlFlow => env.enable_bogus_control_flow = true,
                PassKind::Flattening => env.enable_flattening = true,
                PassKind::Substitution => env.enable_substitution = true,
                PassKind::IndirectBranch => env.enable_indirect_branch = true,
                PassKind::FunctionWrapper => env.enable_function_wrapper = true,
            }
            let via_env = ToggleConfiguration::resolve(&ObfuscationOptions::default(), &env);
            assert_eq!(via_option, via_env, "mismatch for {}", kind.name());
        }
    }

    #[test]
    fn test_disable_override_beats_master_enable() {
        let options = ObfuscationOptions {
            enable_all: true,
            disable_indirect_branch: true,
            disable_anti_class_dump: true,
            ..ObfuscationOptions::default()
        };
        let toggles = ToggleConfiguration::resolve(&options, &EnvOverrides::default());
        assert!(!toggles.enabled(PassKind::IndirectBranch));
        assert!(!toggles.enabled(PassKind::AntiClassDump));
        assert!(toggles.enabled(PassKind::Flattening));
    }

    #[test]
    fn test_env_disable_override_beats_explicit_enable() {
        let options = ObfuscationOptions::new().with_pass(PassKind::IndirectBranch, true);
        let env = EnvOverrides {
            disable_indirect_branch: true,
            ..EnvOverrides::default()
        };
        let toggles = ToggleConfiguration::resolve(&options, &env);
        assert!(!toggles.enabled(PassKind::IndirectBranch));
    }

    #[test]
    fn test_resolution_is_deterministic() {
        let options = ObfuscationOptions::new()
            .with_pass(PassKind::Flattening, true)
            .with_pass(PassKind::Substitution, true);
        let env = EnvOverrides {
            enable_string_encryption: true,
            ..EnvOverrides::default()
        };
        let first = ToggleConfiguration::resolve(&options, &env);
        let second = ToggleConfiguration::resolve(&options, &env);
        assert_eq!(first, second);
    }

    #[test]
    fn test_explicit_seed_used_verbatim() {
        let options = ObfuscationOptions::new().with_seed(42);
        let resolved = ResolvedConfig::resolve(&options, &EnvOverrides::default());
        assert_eq!(resolved.seed, 42);
    }

    #[test]
    fn test_sentinel_seed_draws_entropy() {
        let options = ObfuscationOptions::default();
        let first = ResolvedConfig::resolve(&options, &EnvOverrides::default());
        let second = ResolvedConfig::resolve(&options, &EnvOverrides::default());
        // Equal draws are possible in principle, never in practice.
        assert_ne!(first.seed, second.seed);
    }
}
