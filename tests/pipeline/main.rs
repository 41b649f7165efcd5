//! Pipeline integration tests.

mod support;
mod scenarios;
mod fanout;
mod catalog;
