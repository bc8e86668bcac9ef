//! Protocol types generated from `proto/provider.proto`.

tonic::include_proto!("hemmer.provider.v1");
