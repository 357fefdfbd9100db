//! Critic Suite (C5) — pluggable phase-boundary validators.
//!
//! Each critic implements `domain::ports::critic::Critic`. The Quality Gate
//! (C8) selects which critics apply to a given phase via
//! `applicable_phases`, runs cheap ones before expensive ones (`cost`), and
//! treats a `Fail` from an authoritative critic as blocking.

pub mod build;
pub mod lint;
pub mod process;
pub mod reasoning;
pub mod security_scan;
pub mod structural;
pub mod test_suite;

pub use build::BuildCritic;
pub use lint::LintCritic;
pub use process::ProcessCritic;
pub use reasoning::ReasoningCritic;
pub use security_scan::SecurityScanCritic;
pub use structural::StructuralCritic;
pub use test_suite::TestSuiteCritic;
