pub mod api_client_test;
pub mod sync_flow_test;
