mod common;
mod extraction;
