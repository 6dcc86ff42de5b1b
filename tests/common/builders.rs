//! Test data builders for creating pipes

use faucet_rs::Pipe;

/// Builder for pipes whose inputs always return the same poll result
pub struct PipeBuilder<T> {
    name: String,
    inputs: Vec<Option<T>>,
}

impl<T: Clone + Send + Sync + 'static> PipeBuilder<T> {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            inputs: Vec::new(),
        }
    }

    /// An input that always yields `value`.
    pub fn found(mut self, value: T) -> Self {
        self.inputs.push(Some(value));
        self
    }

    /// An input that never has anything.
    pub fn not_found(mut self) -> Self {
        self.inputs.push(None);
        self
    }

    pub fn build(self) -> Pipe<T> {
        let pipe = Pipe::named(self.name);
        for result in self.inputs {
            pipe.add_input(move |_| Ok(result.clone()));
        }
        pipe
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pipe_builder() {
        let pipe = PipeBuilder::new("fixed").found(1).not_found().found(2).build();

        assert_eq!(pipe.name(), "fixed");
        assert_eq!(pipe.input_count(), 3);
        assert_eq!(pipe.output_count(), 0);
    }
}
