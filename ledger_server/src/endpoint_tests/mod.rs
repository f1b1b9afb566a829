mod helpers;
mod status;
