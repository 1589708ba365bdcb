mod common;
mod progress;
mod properties;
