//!
//! Composite output keys.
//!
//! An output is identified by `(txid, index)`; exported records refer to it
//! through the single string `<txid>_<index>`. A txid is hex and an index is
//! decimal, so the underscore can never appear in the index part and the key
//! splits back uniquely at its last underscore.
//!

pub const KEY_SEPARATOR: char = '_';

///
/// Build the composite key of output `index` of transaction `txid`.
///
#[inline]
pub fn composite_key(txid: &str, index: u32) -> String {
    format!("{}{}{}", txid, KEY_SEPARATOR, index)
}

///
/// Split a composite key back into `(txid, index)`.
///
pub fn split_key(key: &str) -> Option<(&str, u32)> {
    let (txid, index) = key.rsplit_once(KEY_SEPARATOR)?;
    Some((txid, index.parse().ok()?))
}
