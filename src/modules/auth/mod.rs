pub mod device_flow;
