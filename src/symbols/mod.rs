//! Symbol identities, symbol-server paths, and module/symbol pairing.

pub mod correlate;
pub mod identity;
pub mod path;

pub use correlate::{base_name, find_symbol};
pub use identity::{
    module_debug_info, symbol_signature, DebugInfo, HeaderSignatureExtractor, Signature,
    SignatureExtractor, SignatureKind, SymbolReference,
};
pub use path::SymbolServerPath;
