mod fakes;
mod hold;
mod queue;
mod single_shot;
