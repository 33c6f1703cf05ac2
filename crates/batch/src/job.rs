// Archivo: job.rs
// Propósito: definición inmutable de un job (steps + reglas de flujo), su
// builder con validación y los incrementadores de parámetros.
use crate::domain::{BatchStatus, ExitStatus, JobParameter, JobParameters};
use crate::errors::{BatchError, Result};
use crate::step::Step;
use indexmap::IndexMap;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Destino de una transición.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowTarget {
    /// Continuar con el step indicado.
    Step(String),
    /// Terminar el job (COMPLETED si ningún step falló).
    End,
    /// Terminar el job como FAILED.
    Fail,
    /// Terminar el job como STOPPED.
    Stop,
}

/// Regla `(from, exit code) -> destino`. `on` admite un código exacto o `*`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub from: String,
    pub on: String,
    pub to: FlowTarget,
}

impl Transition {
    fn matches(&self, code: &str) -> bool {
        self.on == "*" || self.on == code
    }
}

/// Genera los parámetros de la siguiente instancia a partir de los de la
/// anterior.
pub trait JobParametersIncrementer: Send + Sync {
    fn next(&self, previous: Option<&JobParameters>) -> JobParameters;
}

/// `run.id` = anterior + 1 (1 si no hay anterior).
#[derive(Debug, Default, Clone, Copy)]
pub struct RunIdIncrementer;

impl RunIdIncrementer {
    pub const KEY: &'static str = "run.id";
}

impl JobParametersIncrementer for RunIdIncrementer {
    fn next(&self, previous: Option<&JobParameters>) -> JobParameters {
        let mut params = previous.cloned().unwrap_or_default();
        let next_id = previous.and_then(|p| p.get_long(Self::KEY)).unwrap_or(0) + 1;
        params.insert(Self::KEY, JobParameter::Long(next_id), true);
        params
    }
}

/// Definición inmutable de un job.
pub struct JobDefinition {
    name: String,
    steps: IndexMap<String, Arc<dyn Step>>,
    /// Steps de la secuencia principal, en orden.
    sequence: Vec<String>,
    transitions: Vec<Transition>,
    incrementer: Option<Arc<dyn JobParametersIncrementer>>,
}

impl JobDefinition {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn step_names(&self) -> Vec<&str> {
        self.steps.keys().map(|s| s.as_str()).collect()
    }

    pub fn step(&self, name: &str) -> Option<Arc<dyn Step>> {
        self.steps.get(name).cloned()
    }

    pub fn first_step(&self) -> &str {
        // `build` garantiza al menos un step en la secuencia
        &self.sequence[0]
    }

    pub fn incrementer(&self) -> Option<Arc<dyn JobParametersIncrementer>> {
        self.incrementer.clone()
    }

    /// Decide el siguiente destino tras `from`. Las reglas explícitas con
    /// código exacto ganan a las de `*`; sin regla aplica el flujo por
    /// defecto según el estado del step.
    pub fn next_target(&self, from: &str, status: BatchStatus, exit: &ExitStatus) -> FlowTarget {
        let candidates: Vec<&Transition> = self.transitions.iter().filter(|t| t.from == from).collect();
        if let Some(t) = candidates.iter().find(|t| t.on == exit.code) {
            return t.to.clone();
        }
        if let Some(t) = candidates.iter().find(|t| t.matches(&exit.code)) {
            return t.to.clone();
        }
        match status {
            BatchStatus::Completed => self.default_next(from),
            BatchStatus::Stopped => FlowTarget::Stop,
            _ => FlowTarget::Fail,
        }
    }

    fn default_next(&self, from: &str) -> FlowTarget {
        match self.sequence.iter().position(|s| s == from) {
            Some(idx) if idx + 1 < self.sequence.len() => FlowTarget::Step(self.sequence[idx + 1].clone()),
            _ => FlowTarget::End,
        }
    }
}

impl std::fmt::Debug for JobDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobDefinition")
         .field("name", &self.name)
         .field("steps", &self.step_names())
         .field("transitions", &self.transitions)
         .finish()
    }
}

/// Builder de `JobDefinition`.
///
/// ```rust,ignore
/// let job = JobBuilder::new("etl").start(step1).next(step2).build()?;
/// ```
pub struct JobBuilder {
    name: String,
    steps: Vec<Arc<dyn Step>>,
    sequence: Vec<String>,
    transitions: Vec<Transition>,
    incrementer: Option<Arc<dyn JobParametersIncrementer>>,
}

impl JobBuilder {
    pub fn new(name: &str) -> Self {
        Self { name: name.to_string(),
               steps: Vec::new(),
               sequence: Vec::new(),
               transitions: Vec::new(),
               incrementer: None }
    }

    /// Primer step de la secuencia principal.
    pub fn start<S: Step + 'static>(self, step: S) -> Self {
        self.next(step)
    }

    /// Añade un step al final de la secuencia principal.
    pub fn next<S: Step + 'static>(mut self, step: S) -> Self {
        self.sequence.push(step.name().to_string());
        self.steps.push(Arc::new(step));
        self
    }

    /// Registra un step fuera de la secuencia, alcanzable sólo mediante
    /// transiciones.
    pub fn step<S: Step + 'static>(mut self, step: S) -> Self {
        self.steps.push(Arc::new(step));
        self
    }

    /// Regla condicional `(from, exit code) -> to`.
    pub fn on(mut self, from: &str, exit_code: &str, to: FlowTarget) -> Self {
        self.transitions.push(Transition { from: from.to_string(), on: exit_code.to_string(), to });
        self
    }

    pub fn incrementer(mut self, incrementer: Arc<dyn JobParametersIncrementer>) -> Self {
        self.incrementer = Some(incrementer);
        self
    }

    pub fn build(self) -> Result<JobDefinition> {
        if self.name.trim().is_empty() {
            return Err(BatchError::Configuration("el job necesita un nombre".into()));
        }
        if self.sequence.is_empty() {
            return Err(BatchError::Configuration(format!("job '{}': no tiene steps", self.name)));
        }
        let mut steps: IndexMap<String, Arc<dyn Step>> = IndexMap::new();
        for step in self.steps {
            let name = step.name().to_string();
            if steps.insert(name.clone(), step).is_some() {
                return Err(BatchError::Configuration(format!("job '{}': step duplicado '{}'", self.name, name)));
            }
        }
        for t in &self.transitions {
            if !steps.contains_key(&t.from) {
                return Err(BatchError::Configuration(format!("job '{}': transición desde step desconocido '{}'",
                                                             self.name, t.from)));
            }
            if let FlowTarget::Step(to) = &t.to {
                if !steps.contains_key(to) {
                    return Err(BatchError::Configuration(format!("job '{}': transición hacia step desconocido '{}'",
                                                                 self.name, to)));
                }
            }
            if t.on.trim().is_empty() {
                return Err(BatchError::Configuration(format!("job '{}': transición desde '{}' sin código de salida",
                                                             self.name, t.from)));
            }
        }
        let job = JobDefinition { name: self.name,
                                  steps,
                                  sequence: self.sequence,
                                  transitions: self.transitions,
                                  incrementer: self.incrementer };
        check_acyclic(&job)?;
        for name in job.steps.keys() {
            let reachable = job.sequence.contains(name)
                            || job.transitions.iter().any(|t| t.to == FlowTarget::Step(name.clone()));
            if !reachable {
                log::warn!("job '{}': el step '{}' no es alcanzable", job.name, name);
            }
        }
        Ok(job)
    }
}

/// Rechaza grafos de flujo con ciclos: cada ejecución visita cada step a lo
/// sumo una vez.
fn check_acyclic(job: &JobDefinition) -> Result<()> {
    let mut edges: HashMap<&str, Vec<&str>> = HashMap::new();
    for (idx, name) in job.sequence.iter().enumerate() {
        if let Some(next) = job.sequence.get(idx + 1) {
            edges.entry(name.as_str()).or_default().push(next.as_str());
        }
    }
    for t in &job.transitions {
        if let FlowTarget::Step(to) = &t.to {
            edges.entry(t.from.as_str()).or_default().push(to.as_str());
        }
    }

    fn visit<'a>(node: &'a str,
                 edges: &HashMap<&'a str, Vec<&'a str>>,
                 in_path: &mut HashSet<&'a str>,
                 done: &mut HashSet<&'a str>)
                 -> std::result::Result<(), String> {
        if done.contains(node) {
            return Ok(());
        }
        if !in_path.insert(node) {
            return Err(node.to_string());
        }
        for next in edges.get(node).into_iter().flatten() {
            visit(*next, edges, in_path, done)?;
        }
        in_path.remove(node);
        done.insert(node);
        Ok(())
    }

    let mut done = HashSet::new();
    for name in job.steps.keys() {
        let mut in_path = HashSet::new();
        visit(name.as_str(), &edges, &mut in_path, &mut done).map_err(|step| {
            BatchError::Configuration(format!("job '{}': ciclo en el flujo a través de '{}'", job.name, step))
        })?;
    }
    Ok(())
}
