// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Tributary embedded backend
//
// A single-process `LogManager` that keeps every log in a directory under a
// base path. Each partition is a `tributary-segment` directory; consumer
// group offsets are small JSON files next to the segments.
//
// Reads wake on appends made through the same manager and otherwise re-check
// the disk every `poll_interval`. Seeking by timestamp is not supported.

pub mod appender;
pub mod config;
pub mod layout;
pub mod manager;
pub mod tailer;

pub use appender::EmbeddedAppender;
pub use config::EmbeddedConfig;
pub use manager::EmbeddedLogManager;
pub use tailer::EmbeddedTailer;
