//! Marks for objects scheduled to move to another shard.

use crate::keys;
use crate::store::{put_value, remove_key, scan_prefix, Metabase, MetabaseResult};
use crate::tables::{TO_MOVE_IT_PREFIX, ZERO_VALUE};
use fsnode_common::Address;

impl Metabase {
    /// Schedule `address` for relocation
    pub fn move_it(&self, address: &Address) -> MetabaseResult<()> {
        self.write(|table| put_value(table, &keys::to_move_it(address), ZERO_VALUE))
    }

    /// Drop the relocation mark of `address`
    pub fn do_not_move(&self, address: &Address) -> MetabaseResult<()> {
        self.write(|table| remove_key(table, &keys::to_move_it(address)))
    }

    /// Addresses currently scheduled for relocation
    pub fn movable(&self) -> MetabaseResult<Vec<Address>> {
        self.read(|table| {
            let mut result = Vec::new();
            scan_prefix(table, &[TO_MOVE_IT_PREFIX], |key, _| {
                result.push(keys::parse_address(key)?);
                Ok(false)
            })?;
            Ok(result)
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::fixtures::{open, random_cid, regular};

    #[test]
    fn test_move_marks() {
        let (_dir, mb) = open();
        let cid = random_cid();
        let a = regular(cid, b"a").address();
        let b = regular(cid, b"b").address();

        mb.move_it(&a).unwrap();
        mb.move_it(&b).unwrap();
        let mut movable = mb.movable().unwrap();
        movable.sort();
        let mut expected = vec![a, b];
        expected.sort();
        assert_eq!(movable, expected);

        mb.do_not_move(&a).unwrap();
        assert_eq!(mb.movable().unwrap(), vec![b]);
    }
}
