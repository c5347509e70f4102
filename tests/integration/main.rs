//! Integration tests for the ERP client
//! These run the real reqwest transport against a local mock backend

pub mod test_harness;

pub mod resource_api_test;
pub mod session_flow_test;
