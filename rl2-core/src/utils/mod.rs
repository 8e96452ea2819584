pub mod build_sequential;
pub mod clip_grad;
pub mod reward_history;
pub mod tensor_utils;
