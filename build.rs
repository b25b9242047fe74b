// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Generates the gRPC client and server stubs for the `remote.RemoteProvider` service.
//!
//! The message types are hand-written `prost` structs in `src/remote/proto.rs`, so no
//! `protoc` invocation is needed: only the service plumbing is generated here.

fn method(name: &str, route: &str, input: &str, output: &str) -> tonic_build::manual::Method {
    tonic_build::manual::Method::builder()
        .name(name)
        .route_name(route)
        .input_type(format!("crate::remote::proto::{input}"))
        .output_type(format!("crate::remote::proto::{output}"))
        .codec_path("tonic::codec::ProstCodec")
        .build()
}

fn main() {
    let service = tonic_build::manual::Service::builder()
        .name("RemoteProvider")
        .package("remote")
        .method(method("login", "Login", "LoginRequest", "LoginResponse"))
        .method(method("get_zones", "GetZones", "GetZonesRequest", "Zones"))
        .method(method(
            "get_zone_state",
            "GetZoneState",
            "GetZoneStateRequest",
            "ZoneState",
        ))
        .method(method("execute", "Execute", "ExecuteRequest", "ExecuteResponse"))
        .build();

    tonic_build::manual::Builder::new().compile(&[service]);

    println!("cargo:rerun-if-changed=build.rs");
}
