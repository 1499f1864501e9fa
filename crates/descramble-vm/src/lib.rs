//! JSVMP (bytecode virtual-machine protection) reversal.
//!
//! The engine runs a fixed state machine: detect the interpreter loop,
//! identify the VM family, gate on detection confidence, optionally extract
//! the instruction set, then restore through the family's restorer. Every
//! failure path degrades to the original code plus warnings; the public
//! entry point never errors.

pub mod classify;
pub mod detect;
pub mod instructions;
pub mod restore;

use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tracing::{debug, warn};

use descramble_core::llm::LlmClient;
use descramble_core::model::{UnresolvedPart, VmFeatures, VmInstruction};
use descramble_core::timeout::Budget;

pub use classify::VmType;
pub use detect::{detect_vm, VmDetection};

/// Restoration only runs above this detection confidence.
pub const CONFIDENCE_GATE: f64 = 0.3;

#[derive(Debug, Clone)]
pub struct VmOptions {
    pub aggressive: bool,
    pub extract_instructions: bool,
    pub budget: Budget,
}

impl Default for VmOptions {
    fn default() -> Self {
        Self { aggressive: false, extract_instructions: true, budget: Budget::unlimited() }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct VmStats {
    pub processing_ms: u128,
    pub source_bytes: usize,
}

#[derive(Debug, Clone)]
pub struct VmReport {
    pub is_jsvmp: bool,
    pub vm_type: Option<VmType>,
    pub confidence: f64,
    pub deobfuscated_code: String,
    pub warnings: Vec<String>,
    pub unresolved_parts: Vec<UnresolvedPart>,
    pub features: Option<VmFeatures>,
    pub instructions: Vec<VmInstruction>,
    pub stats: VmStats,
}

pub struct JsvmpDeobfuscator {
    llm: Option<Arc<dyn LlmClient>>,
}

impl JsvmpDeobfuscator {
    pub fn new(llm: Option<Arc<dyn LlmClient>>) -> Self {
        Self { llm }
    }

    pub fn deobfuscate(&self, code: &str, options: &VmOptions) -> VmReport {
        let started = Instant::now();
        let mut report = VmReport {
            is_jsvmp: false,
            vm_type: None,
            confidence: 0.0,
            deobfuscated_code: code.to_string(),
            warnings: Vec::new(),
            unresolved_parts: Vec::new(),
            features: None,
            instructions: Vec::new(),
            stats: VmStats { processing_ms: 0, source_bytes: code.len() },
        };

        let Some(detection) = detect::detect_vm(code) else {
            report.warnings.push("no interpreter loop structure detected".into());
            report.stats.processing_ms = started.elapsed().as_millis();
            return report;
        };

        report.is_jsvmp = true;
        report.confidence = detection.confidence;
        report.features = Some(detection.features.clone());

        let vm_type = classify::identify_vm_type(code);
        report.vm_type = Some(vm_type);
        debug!(vm_type = vm_type.as_str(), confidence = detection.confidence, "vm identified");

        if detection.confidence <= CONFIDENCE_GATE {
            report.warnings.push(format!(
                "vm detection confidence {:.2} is too low to attempt restoration",
                detection.confidence
            ));
            report.stats.processing_ms = started.elapsed().as_millis();
            return report;
        }

        if options.extract_instructions {
            report.instructions = instructions::extract_instructions(code);
        }

        if options.budget.exhausted() {
            warn!("time budget exhausted before restoration");
            report.warnings.push("time budget exhausted before restoration stage".into());
            report.stats.processing_ms = started.elapsed().as_millis();
            return report;
        }

        let restorer = restore::restorer_for(vm_type);
        let restoration = restorer.restore(&restore::RestoreInput {
            code,
            aggressive: options.aggressive,
            features: &detection.features,
            llm: self.llm.as_deref(),
        });

        report.deobfuscated_code = restoration.code;
        report.confidence = restoration.confidence.max(detection.confidence);
        report.warnings.extend(restoration.warnings);
        report.unresolved_parts = restoration.unresolved;
        report.stats.processing_ms = started.elapsed().as_millis();
        report
    }
}
