use candle_core::Result;
use candle_nn::{AdamW, Optimizer, ParamsAdamW, VarMap};
use rl2_agents::{AgentKind, baseline::Baseline, ppo::PPO, vpg::VPG};
use rl2_core::{policies::PolicyKind, utils::clip_grad::OptimizerWithMaxGrad};

#[derive(Debug, Clone)]
pub enum AgentType {
    VPG,
    PPO { clip_range: f32 },
}

#[derive(Debug, Clone)]
pub struct AgentBuilder {
    pub agent_type: AgentType,
    pub learning_rate: f64,
    pub max_grad_norm: Option<f32>,
    pub baseline: Baseline,
    pub center_adv: bool,
    pub entropy_coeff: f32,
    pub update_epochs: usize,
}

impl Default for AgentBuilder {
    fn default() -> Self {
        Self {
            agent_type: AgentType::PPO { clip_range: 0.2 },
            learning_rate: 1e-3,
            max_grad_norm: Some(0.5),
            baseline: Baseline::TimeMean,
            center_adv: true,
            entropy_coeff: 0.,
            update_epochs: 5,
        }
    }
}

impl AgentBuilder {
    /// `varmap` has to hold the policy's parameters, they are what the optimizer updates.
    pub fn build(
        &self,
        policy: PolicyKind,
        varmap: VarMap,
        discount: f32,
        max_path_length: usize,
    ) -> Result<AgentKind> {
        let params = ParamsAdamW {
            lr: self.learning_rate,
            ..Default::default()
        };
        let optimizer = AdamW::new(varmap.all_vars(), params)?;
        let optimizer = OptimizerWithMaxGrad::new(optimizer, self.max_grad_norm, varmap);
        let agent = match self.agent_type {
            AgentType::VPG => AgentKind::VPG(VPG {
                policy,
                optimizer,
                discount,
                max_path_length,
                baseline: self.baseline,
                center_adv: self.center_adv,
                entropy_coeff: self.entropy_coeff,
                update_epochs: self.update_epochs,
            }),
            AgentType::PPO { clip_range } => AgentKind::PPO(PPO {
                policy,
                optimizer,
                clip_range,
                discount,
                max_path_length,
                baseline: self.baseline,
                center_adv: self.center_adv,
                entropy_coeff: self.entropy_coeff,
                update_epochs: self.update_epochs,
            }),
        };
        Ok(agent)
    }
}
