mod interpreter;
mod invalidation;
mod properties;
mod serialization;
mod support;
