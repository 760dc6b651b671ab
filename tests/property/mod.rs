pub mod normalization_proptest;
pub mod queue_proptest;
