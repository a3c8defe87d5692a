//! Plugin protocol types generated from `proto/provider.proto`.

tonic::include_proto!("provider.v1");
