mod local_state;
mod show_runs;
