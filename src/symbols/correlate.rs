//! Pairing modules with their symbol files by name.
//!
//! Names are compared with the extension of the last component removed and
//! the directory part kept, so `lib/Foo.dll` pairs with `lib/Foo.pdb` but not
//! with `ref/Foo.pdb`. When several candidates share a base name the first one
//! in iteration order wins.

use std::sync::Arc;

use crate::package::PackageEntry;
use crate::symbols::path::is_separator;

/// Entry name without the extension of its final component
pub fn base_name(name: &str) -> &str {
    let component_start = name.rfind(is_separator).map_or(0, |i| i + 1);
    match name[component_start..].rfind('.') {
        Some(dot) if dot > 0 => &name[..component_start + dot],
        _ => name,
    }
}

/// Case-insensitive base-name equality
pub fn same_base_name(a: &str, b: &str) -> bool {
    let (a, b) = (base_name(a), base_name(b));
    a.eq_ignore_ascii_case(b) || a.to_lowercase() == b.to_lowercase()
}

/// First symbol entry that pairs with the module entry named `module`
pub fn find_symbol<'a>(
    module: &str,
    symbols: &'a [Arc<dyn PackageEntry>],
) -> Option<&'a Arc<dyn PackageEntry>> {
    symbols
        .iter()
        .find(|entry| same_base_name(module, entry.name()))
}
