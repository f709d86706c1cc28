// /////////////////////////////////////////////////////////////////////////////
// Chunked Upload Engine
// SPDX-License-Identifier: BSD-3-Clause
// /////////////////////////////////////////////////////////////////////////////

//! Application layer: use-case orchestration over the domain's entities,
//! value objects, and ports. No module here performs I/O directly; each
//! service either holds a domain port trait object or delegates to the
//! `infrastructure` layer through one.

pub mod services;
