pub mod nodes;
pub mod tensor;
