//! Contains traits implemented by the cpuscope derive macros


/// Trait to get the number of variants in an enum
pub trait EnumCountT {
    /// Number of variants in the enum
    const COUNT : usize;
}

/// Trait to get an enum variant from its dense index
pub trait EnumFromIndexT: Sized {
    /// Try to convert an index to an enum
    fn from_idx(idx: usize) -> Option<Self>;

    /// Try to convert an index to an enum, if it couldn't convert it, return a default value
    fn from_idx_or(idx: usize, default: Self) -> Self;
}

/// Trait to get the stable token of an enum variant
pub trait EnumNameT {
    /// Name of the variant, as used in the textual vocabulary of the enum
    fn name(&self) -> &'static str;
}

pub trait EnumFromNameT: Sized {
    /// Try to parse the enum from a string slice.
    fn parse(s: &str) -> Option<Self>;

    /// Try to parse the enum from a string slice, ignoring ASCII case.
    fn parse_ignore_case(s: &str) -> Option<Self>;
}
