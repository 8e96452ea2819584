use candle_core::Result;
use candle_nn::VarBuilder;
use rl2_core::{
    env::EnvironmentDescription,
    policies::{
        PolicyKind, categorical_gru_policy::CategoricalGruPolicy,
        categorical_mlp_policy::CategoricalMlpPolicy, gaussian_mlp_policy::GaussianMlpPolicy,
    },
};

#[derive(Debug, Clone)]
pub enum PolicyBuilder {
    Mlp {
        hidden_layers: Vec<usize>,
    },
    /// For continuous action spaces
    GaussianMlp {
        hidden_layers: Vec<usize>,
        init_std: f32,
    },
    Gru {
        hidden_dim: usize,
        state_include_action: bool,
    },
}

impl Default for PolicyBuilder {
    fn default() -> Self {
        Self::Gru {
            hidden_dim: 32,
            state_include_action: true,
        }
    }
}

impl PolicyBuilder {
    pub fn build(
        &self,
        env_description: &EnvironmentDescription,
        vb: &VarBuilder,
    ) -> Result<PolicyKind> {
        match self {
            Self::Mlp { hidden_layers } => Ok(PolicyKind::CategoricalMlp(
                CategoricalMlpPolicy::build(env_description, hidden_layers, &vb.pp("policy"))?,
            )),
            Self::GaussianMlp {
                hidden_layers,
                init_std,
            } => Ok(PolicyKind::GaussianMlp(GaussianMlpPolicy::build(
                env_description,
                hidden_layers,
                *init_std,
                &vb.pp("policy"),
            )?)),
            Self::Gru {
                hidden_dim,
                state_include_action,
            } => Ok(PolicyKind::CategoricalGru(CategoricalGruPolicy::build(
                env_description,
                *hidden_dim,
                *state_include_action,
                &vb.pp("policy"),
            )?)),
        }
    }
}
