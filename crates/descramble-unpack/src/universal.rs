//! Ordered front door for the unpacking family.

use descramble_core::model::ObfuscationType;
use tracing::debug;

use crate::{AaDecoder, PackerUnpacker, UrlDecoder};

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum UnpackKind {
    Packer,
    AaEncode,
    UrlEncoded,
    Unknown,
}

impl UnpackKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnpackKind::Packer => "Packer",
            UnpackKind::AaEncode => "AAEncode",
            UnpackKind::UrlEncoded => "URLEncode",
            UnpackKind::Unknown => "Unknown",
        }
    }

    /// Detector tag corresponding to this unpacker, used for the post-hoc
    /// type merge in the pipeline result.
    pub fn obfuscation_type(&self) -> Option<ObfuscationType> {
        match self {
            UnpackKind::Packer => Some(ObfuscationType::Packer),
            UnpackKind::AaEncode => Some(ObfuscationType::AaEncode),
            UnpackKind::UrlEncoded => Some(ObfuscationType::UrlEncoded),
            UnpackKind::Unknown => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct UnpackOutcome {
    pub kind: UnpackKind,
    pub success: bool,
    pub code: String,
    pub warnings: Vec<String>,
}

pub struct UniversalUnpacker;

impl UniversalUnpacker {
    /// Tries Packer, then AAEncode, then URLEncode. The first family whose
    /// signature matches decides the outcome; later families are not
    /// consulted even if the chosen one fails to improve the code.
    pub fn unpack(code: &str) -> UnpackOutcome {
        if PackerUnpacker::detect(code) {
            debug!("packer signature matched");
            let result = PackerUnpacker::unpack(code);
            return UnpackOutcome {
                kind: UnpackKind::Packer,
                success: result.changed,
                code: result.code,
                warnings: result.warnings,
            };
        }
        if AaDecoder::detect(code) {
            debug!("aaencode signature matched");
            let result = AaDecoder::deobfuscate(code);
            return UnpackOutcome {
                kind: UnpackKind::AaEncode,
                success: result.changed,
                code: result.code,
                warnings: result.warnings,
            };
        }
        if UrlDecoder::detect(code) {
            debug!("percent-encoding density matched");
            let result = UrlDecoder::deobfuscate(code);
            return UnpackOutcome {
                kind: UnpackKind::UrlEncoded,
                success: result.changed,
                code: result.code,
                warnings: result.warnings,
            };
        }
        UnpackOutcome {
            kind: UnpackKind::Unknown,
            success: false,
            code: code.to_string(),
            warnings: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packer_wins_over_later_families() {
        let packed = "eval(function(p,a,c,k,e,d){return p}('0 1',62,2,'hello|world'.split('|'),0,{}))";
        let outcome = UniversalUnpacker::unpack(packed);
        assert_eq!(outcome.kind, UnpackKind::Packer);
        assert!(outcome.success);
        assert_eq!(outcome.code, "hello world");
    }

    #[test]
    fn unknown_when_nothing_matches() {
        let outcome = UniversalUnpacker::unpack("let x = 1;");
        assert_eq!(outcome.kind, UnpackKind::Unknown);
        assert!(!outcome.success);
        assert_eq!(outcome.code, "let x = 1;");
    }

    #[test]
    fn url_encoded_input_reaches_the_url_decoder() {
        let outcome = UniversalUnpacker::unpack("%76%61%72%20%61%3d%31");
        assert_eq!(outcome.kind, UnpackKind::UrlEncoded);
        assert!(outcome.success);
        assert_eq!(outcome.code, "var a=1");
    }
}
