// /////////////////////////////////////////////////////////////////////////////
// Chunked Upload Engine
// SPDX-License-Identifier: BSD-3-Clause
// /////////////////////////////////////////////////////////////////////////////

//! Infrastructure implementations of the domain's `Adapter` and
//! `NetworkProbe` ports.

mod file_adapter;
mod http_adapter;
mod sampling_network_probe;

pub use http_adapter::{HttpAdapter, HttpAdapterConfig};
pub use sampling_network_probe::{QualityThresholds, SamplingNetworkProbe, SamplingNetworkProbeConfig};
