mod bootstrap;
mod end_to_end;
