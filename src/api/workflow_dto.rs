use serde::Deserialize;

fn default_cores() -> u32 {
    1
}

fn default_selectivity() -> f64 {
    1.0
}

fn default_execution_period() -> f64 {
    1.0
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowsDto {
    pub workflows: Vec<WorkflowDto>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowDto {
    pub id: String,
    pub tasks: Vec<TaskDto>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskDto {
    pub id: String,
    /// Compute length in million instructions.
    pub length: u64,
    #[serde(default = "default_cores")]
    pub cores: u32,
    #[serde(default)]
    pub input_files: Vec<InputFileDto>,
    #[serde(default)]
    pub output_files: Vec<OutputFileDto>,
    /// Explicit children. When absent they are inferred from which tasks read this task's output files.
    #[serde(default)]
    pub children: Option<Vec<String>>,
    #[serde(default)]
    pub deadline: Option<f64>,
    #[serde(default)]
    pub entry_time: f64,
    /// Probability that one cycle of this task produces output data.
    #[serde(default = "default_selectivity")]
    pub selectivity: f64,
    #[serde(default = "default_execution_period")]
    pub execution_period: f64,
    #[serde(default)]
    pub vm: Option<String>,
    #[serde(default)]
    pub ram: Option<u64>,
    #[serde(default)]
    pub bw: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InputFileDto {
    pub name: String,
    pub size: u64,
    /// Producing task. Defaults to the sibling that declares the file as output, else the task itself.
    #[serde(default)]
    pub from: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputFileDto {
    pub name: String,
    pub size: u64,
}
