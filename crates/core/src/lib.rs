pub mod engine;
pub mod shared;
pub mod video;

#[cfg(test)]
mod test_support;
