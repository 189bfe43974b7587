pub mod correlation_comparator;
pub mod file_comparison;
