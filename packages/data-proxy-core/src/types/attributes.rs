use bitflags::bitflags;

bitflags! {
    /// Status flags of a single cell as seen through the proxy.
    #[derive(Debug, Clone, Copy, Default, Eq, PartialEq, Hash)]
    pub struct ValueAttributes: u16 {
        /// Value is NULL
        const IS_NULL = 0b0000_0000_0001;
        /// Column accepts NULL
        const CAN_BE_NULL = 0b0000_0000_0010;
        /// Value is the column default (resolved by the base table on commit)
        const IS_DEFAULT = 0b0000_0000_0100;
        /// Column has a default
        const CAN_BE_DEFAULT = 0b0000_0000_1000;
        /// No pending change for this cell
        const IS_UNCHANGED = 0b0000_0001_0000;
        /// Row exists in the base table, so an original value is available
        const HAS_VALUE_ORIG = 0b0000_0010_0000;
        /// Value would be rejected on commit (NULL in a non-nullable column)
        const DATA_NON_VALID = 0b0000_0100_0000;
        /// Cell cannot be written
        const READ_ONLY = 0b0000_1000_0000;
    }
}
