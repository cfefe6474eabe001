use crate::common::{msf_pdb, msf_pdb_with_dbi, portable_pdb, PeBuilder, GUID, GUID_HEX};
use symfeed::config::{ParseLimits, SignatureConfig};
use symfeed::formats::pdb::{detect, SymbolFormat};
use symfeed::formats::ParseError;
use symfeed::symbols::{module_debug_info, symbol_signature, SignatureKind};
use symfeed::{HeaderSignatureExtractor, SignatureExtractor};

#[test]
fn test_msf_signature() {
    let pdb = msf_pdb(GUID, 0x1f);
    assert_eq!(detect(&pdb), Some(SymbolFormat::Msf));

    let sig = symbol_signature(&pdb, &ParseLimits::default()).unwrap();
    assert_eq!(sig.kind(), SignatureKind::Pdb);
    assert_eq!(sig.as_str(), format!("{}1f", GUID_HEX));
}

#[test]
fn test_portable_signature() {
    let pdb = portable_pdb(GUID, 0x0102_0304);
    assert_eq!(detect(&pdb), Some(SymbolFormat::Portable));

    let sig = symbol_signature(&pdb, &ParseLimits::default()).unwrap();
    assert_eq!(sig.kind(), SignatureKind::PortablePdb);
    assert_eq!(sig.as_str(), format!("{}ffffffff", GUID_HEX));
}

#[test]
fn test_symbol_matches_module_reference() {
    let limits = ParseLimits::default();
    let config = SignatureConfig::default();

    let module = PeBuilder::new().codeview(GUID, 4, "Foo.pdb").build();
    let reference = module_debug_info(&module, &config, &limits)
        .unwrap()
        .symbol_reference()
        .unwrap();
    let symbol = symbol_signature(&msf_pdb(GUID, 4), &limits).unwrap();
    assert_eq!(reference.signature, symbol);

    let module = PeBuilder::new().codeview(GUID, 1, "Foo.pdb").portable().build();
    let reference = module_debug_info(&module, &config, &limits)
        .unwrap()
        .symbol_reference()
        .unwrap();
    let symbol = symbol_signature(&portable_pdb(GUID, 0), &limits).unwrap();
    assert_eq!(reference.signature, symbol);
}

#[test]
fn test_msf_signature_uses_dbi_age() {
    let limits = ParseLimits::default();

    // The info stream has been rewritten twice since the image was linked.
    let pdb = msf_pdb_with_dbi(GUID, 5, 3);
    let sig = symbol_signature(&pdb, &limits).unwrap();
    assert_eq!(sig.as_str(), format!("{}3", GUID_HEX));

    let module = PeBuilder::new().codeview(GUID, 3, "Foo.pdb").build();
    let reference = module_debug_info(&module, &SignatureConfig::default(), &limits)
        .unwrap()
        .symbol_reference()
        .unwrap();
    assert_eq!(reference.signature, sig);
}

#[test]
fn test_signature_ignores_stamp_and_padding() {
    let limits = ParseLimits::default();
    let a = symbol_signature(&portable_pdb(GUID, 1), &limits).unwrap();
    let b = symbol_signature(&portable_pdb(GUID, 2), &limits).unwrap();
    assert_eq!(a, b);

    let mut padded = msf_pdb(GUID, 1);
    padded.extend_from_slice(&[0xAB; 512]);
    assert_eq!(
        symbol_signature(&padded, &limits).unwrap(),
        symbol_signature(&msf_pdb(GUID, 1), &limits).unwrap()
    );
}

#[test]
fn test_rejects_malformed_symbol_files() {
    let extractor = HeaderSignatureExtractor::default();

    assert_eq!(
        extractor.symbol_signature(b"garbage"),
        Err(ParseError::UnknownSymbolFormat)
    );

    // Module bytes are not a symbol file.
    assert_eq!(
        extractor.symbol_signature(&PeBuilder::new().build()),
        Err(ParseError::UnknownSymbolFormat)
    );

    let pdb = msf_pdb(GUID, 1);
    assert!(extractor.symbol_signature(&pdb[..1024]).is_err());

    let mut bad_block_size = msf_pdb(GUID, 1);
    bad_block_size[32..36].copy_from_slice(&100u32.to_le_bytes());
    assert!(matches!(
        extractor.symbol_signature(&bad_block_size),
        Err(ParseError::MalformedMsf(_))
    ));

    let portable = portable_pdb(GUID, 0);
    assert!(extractor.symbol_signature(&portable[..40]).is_err());
}

#[test]
fn test_directory_limit() {
    let limits = ParseLimits {
        max_msf_directory_bytes: 8,
        ..ParseLimits::default()
    };
    assert!(matches!(
        symbol_signature(&msf_pdb(GUID, 1), &limits),
        Err(ParseError::LimitExceeded(_))
    ));
}
