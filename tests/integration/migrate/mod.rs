mod resume;
mod scenarios;
mod working_set;
