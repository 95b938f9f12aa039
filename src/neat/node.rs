use std::fmt;

use super::error::NeatError;

#[derive(PartialEq, PartialOrd, Ord, Clone, Copy, Eq, Hash, Debug)]
pub struct NodeId(pub usize);

impl NodeId {
    pub fn inc(self) -> NodeId {
        NodeId(self.0 + 1)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub enum NodeKind {
    Input,
    Hidden,
    Output,
}

#[derive(PartialEq, Eq, Default, Clone, Copy, Debug)]
pub enum Activation {
    #[default]
    Sigmoid,
    Relu,
    Tanh,
    Identity,
}

impl Activation {
    pub fn apply(self, x: f64) -> f64 {
        match self {
            Activation::Sigmoid => 1.0 / (1.0 + (-x).exp()),
            Activation::Relu => {
                if x > 0.0 {
                    x
                } else {
                    0.0
                }
            }
            Activation::Tanh => x.tanh(),
            Activation::Identity => x,
        }
    }
}

/// A single computation unit of a genome.
///
/// Input nodes hold an injected value and ignore their bias. Hidden and output
/// nodes accumulate weighted incoming values during a pass and produce
/// `activation(sum) + bias`.
#[derive(Clone, Debug)]
pub struct Node {
    pub id: NodeId,
    pub kind: NodeKind,
    pub bias: f64,
    pub activation: Activation,
    incoming_sum: f64,
    output: Option<f64>,
}

impl Node {
    pub fn create(id: NodeId, kind: NodeKind, bias: f64) -> Node {
        let bias = if kind == NodeKind::Input { 0.0 } else { bias };
        Node {
            id,
            kind,
            bias,
            activation: Activation::default(),
            incoming_sum: 0.0,
            output: None,
        }
    }

    pub fn input(id: NodeId) -> Node {
        Node::create(id, NodeKind::Input, 0.0)
    }

    pub fn hidden(id: NodeId, bias: f64) -> Node {
        Node::create(id, NodeKind::Hidden, bias)
    }

    pub fn output(id: NodeId, bias: f64) -> Node {
        Node::create(id, NodeKind::Output, bias)
    }

    pub fn with_activation(mut self, activation: Activation) -> Node {
        self.activation = activation;
        self
    }

    pub fn is_input(&self) -> bool {
        self.kind == NodeKind::Input
    }

    /// Input nodes keep the first value they receive until reset; later writes
    /// in the same pass are ignored. Other nodes add the value to their sum.
    pub fn set_input(&mut self, value: f64) {
        match self.kind {
            NodeKind::Input => {
                if self.output.is_none() {
                    self.output = Some(value);
                }
            }
            NodeKind::Hidden | NodeKind::Output => {
                self.incoming_sum += value;
            }
        }
    }

    pub fn evaluate(&mut self) -> Result<f64, NeatError> {
        match self.kind {
            NodeKind::Input => self.output.ok_or(NeatError::UnsetInput { node: self.id }),
            NodeKind::Hidden | NodeKind::Output => {
                let value = self.activation.apply(self.incoming_sum) + self.bias;
                self.output = Some(value);
                Ok(value)
            }
        }
    }

    /// Last value produced by `evaluate` (or injected, for inputs).
    pub fn value(&self) -> Option<f64> {
        self.output
    }

    pub fn reset(&mut self) {
        self.incoming_sum = 0.0;
        self.output = None;
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{:?} {} bias: {:.3}>", self.kind, self.id, self.bias)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn test_input_unset() {
        let mut node = Node::input(NodeId(0));
        assert_eq!(node.evaluate(), Err(NeatError::UnsetInput { node: NodeId(0) }));
    }

    #[test]
    fn test_input_set_once() {
        let mut node = Node::input(NodeId(0));
        node.set_input(0.7);
        node.set_input(-3.0);
        assert_approx_eq!(node.evaluate().unwrap(), 0.7);

        node.reset();
        node.reset();
        assert!(node.value().is_none());
        node.set_input(-3.0);
        assert_approx_eq!(node.evaluate().unwrap(), -3.0);
    }

    #[test]
    fn test_hidden_sums_inputs() {
        let mut node = Node::hidden(NodeId(4), 0.25);
        node.set_input(0.3);
        node.set_input(0.2);
        assert_approx_eq!(node.evaluate().unwrap(), Activation::Sigmoid.apply(0.5) + 0.25);

        node.reset();
        assert_approx_eq!(node.evaluate().unwrap(), 0.5 + 0.25);
    }

    #[test]
    fn test_input_ignores_bias() {
        let node = Node::create(NodeId(1), NodeKind::Input, 1.5);
        assert_eq!(node.bias, 0.0);
    }

    #[test]
    fn test_activations() {
        assert_approx_eq!(Activation::Sigmoid.apply(0.0), 0.5);
        assert_approx_eq!(Activation::Relu.apply(-2.0), 0.0);
        assert_approx_eq!(Activation::Relu.apply(2.0), 2.0);
        assert_approx_eq!(Activation::Tanh.apply(0.0), 0.0);
        assert_approx_eq!(Activation::Identity.apply(-1.25), -1.25);

        let node = Node::output(NodeId(2), 0.0).with_activation(Activation::Relu);
        assert_eq!(node.activation, Activation::Relu);
    }
}
