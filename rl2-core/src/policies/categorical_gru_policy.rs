use super::{Policy, StateInfoSpec};
use crate::{
    distributions::{
        Distribution, DistributionKind, categorical_distribution::CategoricalDistribution,
        dist_info_value,
    },
    env::{EnvironmentDescription, Space},
    path::InfoMap,
};
use candle_core::{D, DType, Device, Result, Tensor, bail};
use candle_nn::{
    Linear, Module, VarBuilder, linear,
    ops::softmax,
    rnn::{GRU, GRUConfig, GRUState, RNN, gru},
};

/// A GRU that keeps its hidden state across steps (and across episodes of the same task) with a
/// softmax head over discrete actions.
pub struct CategoricalGruPolicy {
    gru: GRU,
    output: Linear,
    distribution: DistributionKind,
    action_size: usize,
    hidden_dim: usize,
    state_include_action: bool,
    prev_actions: Option<Tensor>,
    prev_hiddens: Option<Tensor>,
    device: Device,
}

impl CategoricalGruPolicy {
    pub fn build(
        env_description: &EnvironmentDescription,
        hidden_dim: usize,
        state_include_action: bool,
        vb: &VarBuilder,
    ) -> Result<Self> {
        if !matches!(env_description.action_space, Space::Discrete(_)) {
            bail!(
                "categorical policies need a discrete action space, got {:?}",
                env_description.action_space
            );
        }
        let action_size = env_description.action_size();
        let input_dim = if state_include_action {
            env_description.observation_size() + action_size
        } else {
            env_description.observation_size()
        };
        let gru = gru(input_dim, hidden_dim, GRUConfig::default(), vb.pp("gru"))?;
        let output = linear(hidden_dim, action_size, vb.pp("output"))?;
        Ok(Self {
            gru,
            output,
            distribution: DistributionKind::Categorical(CategoricalDistribution::new(action_size)),
            action_size,
            hidden_dim,
            state_include_action,
            prev_actions: None,
            prev_hiddens: None,
            device: vb.device().clone(),
        })
    }

    pub fn hidden_state(&self) -> Option<&Tensor> {
        self.prev_hiddens.as_ref()
    }

    fn step_input(&self, observations: &Tensor, prev_actions: &Tensor) -> Result<Tensor> {
        if self.state_include_action {
            Tensor::cat(&[observations, prev_actions], 1)
        } else {
            Ok(observations.clone())
        }
    }
}

impl Policy for CategoricalGruPolicy {
    fn distribution(&self) -> &DistributionKind {
        &self.distribution
    }

    fn recurrent(&self) -> bool {
        true
    }

    fn state_info_specs(&self) -> Vec<StateInfoSpec> {
        if self.state_include_action {
            vec![StateInfoSpec {
                key: "prev_action",
                shape: vec![self.action_size],
            }]
        } else {
            vec![]
        }
    }

    fn reset(&mut self, dones: &[bool]) -> Result<()> {
        let batch = dones.len();
        match (&self.prev_actions, &self.prev_hiddens) {
            (Some(actions), Some(hiddens)) if actions.dim(0)? == batch => {
                let keep = dones.iter().map(|d| if *d { 0f32 } else { 1. }).collect();
                let keep = Tensor::from_vec(keep, (batch, 1), &self.device)?;
                let actions = actions.broadcast_mul(&keep)?;
                let hiddens = hiddens.broadcast_mul(&keep)?;
                self.prev_actions = Some(actions);
                self.prev_hiddens = Some(hiddens);
            }
            _ => {
                self.prev_actions = Some(Tensor::zeros(
                    (batch, self.action_size),
                    DType::F32,
                    &self.device,
                )?);
                self.prev_hiddens = Some(Tensor::zeros(
                    (batch, self.hidden_dim),
                    DType::F32,
                    &self.device,
                )?);
            }
        }
        Ok(())
    }

    fn get_actions(&mut self, observations: &Tensor) -> Result<(Tensor, InfoMap)> {
        let (Some(prev_actions), Some(prev_hiddens)) = (&self.prev_actions, &self.prev_hiddens)
        else {
            bail!("reset has to be called before sampling actions");
        };
        if prev_actions.dim(0)? != observations.dim(0)? {
            bail!(
                "policy state holds {} rows but {} observations were given",
                prev_actions.dim(0)?,
                observations.dim(0)?
            );
        }
        let input = self.step_input(observations, prev_actions)?;
        let state = self.gru.step(
            &input,
            &GRUState {
                h: prev_hiddens.clone(),
            },
        )?;
        let prob = softmax(&self.output.forward(&state.h)?, D::Minus1)?.detach();
        let mut agent_infos = InfoMap::new().with("prob", prob);
        let actions = self.distribution.sample(&agent_infos)?;
        if self.state_include_action {
            agent_infos.insert("prev_action".to_string(), prev_actions.clone());
        }
        self.prev_actions = Some(actions.clone());
        self.prev_hiddens = Some(state.h.detach());
        Ok((actions, agent_infos))
    }

    fn dist_info(&self, observations: &Tensor, state_infos: &InfoMap) -> Result<InfoMap> {
        let inputs = if self.state_include_action {
            let prev_actions = dist_info_value(state_infos, "prev_action")?;
            Tensor::cat(&[observations, prev_actions], 2)?
        } else {
            observations.clone()
        };
        let (batch, steps, _) = inputs.dims3()?;
        let mut state = self.gru.zero_state(batch)?;
        let mut hiddens = Vec::with_capacity(steps);
        for step in 0..steps {
            let x = inputs.narrow(1, step, 1)?.squeeze(1)?;
            state = self.gru.step(&x, &state)?;
            hiddens.push(state.h.clone());
        }
        let hiddens = Tensor::stack(&hiddens, 1)?;
        let prob = softmax(&self.output.forward(&hiddens)?, D::Minus1)?;
        Ok(InfoMap::new().with("prob", prob))
    }
}
