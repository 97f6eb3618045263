mod api_runtime;
mod api_workflows;
