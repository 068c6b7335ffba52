/// Label allocation for branch targets.
pub mod labels;

/// Formatting of VM instructions.
pub mod vm;
